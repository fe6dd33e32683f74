//! Configuration loading for scout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Conversation history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages kept per conversation; older ones are trimmed on append.
    pub max_messages: usize,
    /// Conversations idle for longer than this many days are pruned.
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            retention_days: 90,
        }
    }
}

/// Configuration for scout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini model identifier.
    pub model: String,

    /// API key; `GEMINI_API_KEY` is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override; `GEMINI_BASE_URL` wins over this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// System instruction sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Stream answers as they are generated.
    pub stream: bool,

    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,

    /// Retries after a failed request.
    pub max_retries: u32,
    /// Fixed delay between retries.
    pub retry_backoff_ms: u64,
    /// Limit for a whole non-streaming request, and for each read of a stream.
    pub timeout_secs: u64,

    /// JSON file holding the asking user's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile_file: Option<PathBuf>,

    pub history: HistoryConfig,
}

pub mod paths {
    //! Path resolution for scout configuration and data files.
    //!
    //! SCOUT_HOME resolution order:
    //! 1. SCOUT_HOME environment variable (if set)
    //! 2. ~/.config/scout (default)

    use std::path::PathBuf;

    /// Returns the scout home directory.
    pub fn scout_home() -> PathBuf {
        if let Ok(home) = std::env::var("SCOUT_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map_or_else(|| PathBuf::from(".scout"), |h| h.join(".config").join("scout"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        scout_home().join("config.toml")
    }

    /// Returns the path to the chat history store.
    pub fn chats_path() -> PathBuf {
        scout_home().join("chats.json")
    }

    /// Expands a leading `~/` to the user's home directory.
    pub fn expand_home(path: &std::path::Path) -> PathBuf {
        if let Ok(rest) = path.strip_prefix("~")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        path.to_path_buf()
    }
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Writes the values from `defaults` into the commented template.
///
/// Template values keep their surrounding whitespace and trailing comments.
/// Keys the template does not mention are appended; `[history]` is the only
/// nested table.
fn fill_template(template: &mut toml_edit::Table, defaults: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, item) in defaults {
        match (template.get_mut(key), item) {
            (Some(Item::Value(existing)), Item::Value(value)) => {
                let decor = existing.decor().clone();
                *existing = value.clone();
                *existing.decor_mut() = decor;
            }
            (Some(Item::Table(existing)), Item::Table(table)) => fill_template(existing, table),
            (_, Item::Value(_) | Item::Table(_)) => {
                template.insert(key, item.clone());
            }
            _ => {}
        }
    }
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash-lite";
    pub const DEFAULT_SYSTEM_PROMPT: &'static str =
        "You are a helpful assistant named Scout. You help people learn new things and network.";

    /// Loads configuration from the default config path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// System instruction to send, ignoring blank overrides.
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_SYSTEM_PROMPT)
    }

    /// Resolved location of the user profile file, if configured.
    pub fn user_profile_path(&self) -> Option<PathBuf> {
        self.user_profile_file
            .as_deref()
            .map(paths::expand_home)
    }

    /// Writes the commented default template to `path`.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        fill_template(doc.as_table_mut(), generated_doc.as_table());
        Ok(doc.to_string())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            system_prompt: Some(Self::DEFAULT_SYSTEM_PROMPT.to_string()),
            stream: true,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 1000,
            timeout_secs: 60,
            user_profile_file: None,
            history: HistoryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.model, "gemini-2.5-flash-lite");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.history.max_messages, 50);
        assert_eq!(config.history.retention_days, 90);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "model = \"gemini-2.5-pro\"\n[history]\nmax_messages = 10\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.history.max_messages, 10);
        assert_eq!(config.history.retention_days, 90);
        assert!(config.stream);
        assert_eq!(config.top_k, 40);
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "model = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config"));
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("gemini-2.5-flash-lite"));
        assert!(contents.contains("# api_key ="));

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        let result = Config::init(&config_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_matches_template_values() {
        let generated = Config::generate().unwrap();
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed, Config::default());
        assert!(generated.contains("model = \"gemini-2.5-flash-lite\""));
        assert!(generated.contains("# Messages kept per conversation."));
    }

    #[test]
    fn test_fill_template_keeps_comments_and_adds_missing_keys() {
        let mut template: toml_edit::DocumentMut =
            "temperature = 0.1 # sampling\n\n[history]\nmax_messages = 1\n"
                .parse()
                .unwrap();
        let defaults: toml_edit::DocumentMut =
            "temperature = 0.7\nstream = true\n\n[history]\nmax_messages = 50\n"
                .parse()
                .unwrap();

        fill_template(template.as_table_mut(), defaults.as_table());
        let filled = template.to_string();

        assert!(filled.contains("temperature = 0.7 # sampling"));
        let parsed: toml::Value = toml::from_str(&filled).unwrap();
        assert_eq!(parsed["stream"].as_bool(), Some(true));
        assert_eq!(parsed["history"]["max_messages"].as_integer(), Some(50));
    }

    #[test]
    fn test_blank_system_prompt_falls_back_to_default() {
        let config = Config {
            system_prompt: Some("   ".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_system_prompt(),
            Config::DEFAULT_SYSTEM_PROMPT
        );
    }
}

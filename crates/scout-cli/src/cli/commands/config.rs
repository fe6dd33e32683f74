//! Config command handlers.

use anyhow::{Context, Result};
use scout_core::config;
use scout_core::providers::gemini::{GeminiClient, GeminiConfig};

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn generate() -> Result<()> {
    let toml = config::Config::generate()?;
    print!("{toml}");
    Ok(())
}

pub async fn test_key(config: &config::Config) -> Result<()> {
    let client = GeminiClient::new(GeminiConfig::from_config(config)?);
    client
        .test_key()
        .await
        .with_context(|| format!("API key test failed for model {}", client.model()))?;
    println!("API key is valid.");
    Ok(())
}

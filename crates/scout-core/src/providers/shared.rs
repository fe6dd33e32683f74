//! Provider-agnostic types and config helpers.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard User-Agent header for scout API requests.
pub const USER_AGENT: &str = concat!("scout/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Config resolution helpers
// ============================================================================

/// Looks up an API key with precedence: config > env.
///
/// Blank values are treated as absent.
pub fn lookup_api_key(config_api_key: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    std::env::var(env_var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Resolves an API key with precedence: config > env.
///
/// # Errors
/// Returns an error naming both sources when neither provides a key.
pub fn resolve_api_key(config_api_key: Option<&str>, env_var: &str) -> Result<String> {
    lookup_api_key(config_api_key, env_var).with_context(|| {
        format!("No API key available. Set {env_var} or api_key in config.toml.")
    })
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the chosen URL is not well-formed.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Error categories for provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Could not reach the server, or the body stream broke off
    Connection,
    /// Failed to parse a response body
    Parse,
    /// Error object returned inside an otherwise successful response
    ApiError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Connection => write!(f, "connection"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
        }
    }
}

/// Structured error from the provider with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
    /// HTTP status code, when the failure came with one
    pub status: Option<u16>,
}

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    /// Creates an HTTP status error.
    ///
    /// When the body is a Google-style `{"error": {"message": ..}}` object the
    /// message is lifted into the summary.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_error_message(body) {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details,
            status: Some(status),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Connection, message)
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Parse, message)
    }

    /// Creates an API error (from an error object in a response or stream event).
    pub fn api_error(error_type: &str, message: &str) -> Self {
        Self::new(ProviderErrorKind::ApiError, format!("{error_type}: {message}"))
    }

    /// Attaches raw details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    json.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Maps a transport-level reqwest failure onto a provider error.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::connection(format!("Connection failed: {e}"))
    } else if e.is_body() || e.is_decode() {
        ProviderError::connection(format!("Response stream interrupted: {e}"))
    } else {
        ProviderError::connection(format!("Network error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_lifts_google_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = ProviderError::http_status(400, body);
        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.status, Some(400));
        assert_eq!(
            err.message,
            "HTTP 400: API key not valid. Please pass a valid API key."
        );
        assert_eq!(err.details.as_deref(), Some(body));
    }

    #[test]
    fn test_http_status_plain_body() {
        let err = ProviderError::http_status(503, "upstream down");
        assert_eq!(err.message, "HTTP 503");
        assert_eq!(err.details.as_deref(), Some("upstream down"));

        let err = ProviderError::http_status(500, "");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_lookup_api_key_prefers_config_and_ignores_blank() {
        assert_eq!(
            lookup_api_key(Some("  from-config  "), "SCOUT_TEST_UNSET_KEY_VAR"),
            Some("from-config".to_string())
        );
        assert_eq!(lookup_api_key(Some("   "), "SCOUT_TEST_UNSET_KEY_VAR"), None);
        assert!(resolve_api_key(None, "SCOUT_TEST_UNSET_KEY_VAR").is_err());
    }

    #[test]
    fn test_resolve_base_url_validates_config_value() {
        let url = resolve_base_url(
            Some("http://127.0.0.1:9000/v1beta/"),
            "SCOUT_TEST_UNSET_URL_VAR",
            "https://default.example",
            "Gemini",
        )
        .unwrap();
        assert_eq!(url, "http://127.0.0.1:9000/v1beta");

        let err = resolve_base_url(
            Some("not a url"),
            "SCOUT_TEST_UNSET_URL_VAR",
            "https://default.example",
            "Gemini",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid Gemini base URL"));

        let url = resolve_base_url(None, "SCOUT_TEST_UNSET_URL_VAR", "https://d.example", "G")
            .unwrap();
        assert_eq!(url, "https://d.example");
    }
}

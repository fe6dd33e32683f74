//! Gemini API key provider (Generative Language API).

use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::sse::consume_stream;
use crate::config::Config;
use crate::providers::shared::{USER_AGENT, classify_reqwest_error};
use crate::providers::{ProviderError, ProviderResult, resolve_api_key, resolve_base_url};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Prompt sent by [`GeminiClient::test_key`].
pub const KEY_TEST_PROMPT: &str = "Hello, this is a test message.";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sampling parameters forwarded as `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub params: GenerationParams,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Builds the client config from the loaded scout config.
    ///
    /// Authentication resolution order:
    /// 1. `api_key` in config.toml
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// `GEMINI_BASE_URL` overrides `base_url` from config.toml.
    ///
    /// # Errors
    /// Returns an error if no key is available or the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), "GEMINI_API_KEY")?;
        let base_url = resolve_base_url(
            config.base_url.as_deref(),
            "GEMINI_BASE_URL",
            DEFAULT_BASE_URL,
            "Gemini",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model.clone(),
            system_prompt: config.effective_system_prompt().to_string(),
            params: GenerationParams::from_config(config),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("Falling back to a default HTTP client: {err}");
                reqwest::Client::new()
            });
        Self { config, http }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Streams an answer, calling `on_text` with the full text after each
    /// delta. Returns the final text.
    ///
    /// # Errors
    /// Transport failures, non-2xx responses and error events.
    pub async fn stream_generate<F>(&self, prompt: &str, on_text: F) -> ProviderResult<String>
    where
        F: FnMut(&str),
    {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, self.config.model
        );
        debug!(%url, "Sending streaming request");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(&self.config.api_key))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body));
        }

        consume_stream(response.bytes_stream(), on_text).await
    }

    /// Requests a complete answer in one response.
    ///
    /// A response without text yields an empty string.
    ///
    /// # Errors
    /// Transport failures, non-2xx responses, unparseable bodies and error
    /// objects in the body.
    pub async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        self.generate_with(&self.request_body(prompt)).await
    }

    /// Sends a minimal request to check that the key is accepted.
    ///
    /// # Errors
    /// The API's error, typically `HTTP 400: API key not valid...`.
    pub async fn test_key(&self) -> ProviderResult<()> {
        let body = build_request(
            None,
            KEY_TEST_PROMPT,
            GenerationParams {
                max_output_tokens: 16,
                ..self.config.params
            },
        );
        self.generate_with(&body).await.map(|_| ())
    }

    async fn generate_with(&self, body: &Value) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        debug!(%url, "Sending request");

        let response = self
            .http
            .post(&url)
            .headers(build_json_headers(&self.config.api_key))
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        if !status.is_success() {
            return Err(ProviderError::http_status(status.as_u16(), &text));
        }

        let value: Value = serde_json::from_str(&text).map_err(|err| {
            ProviderError::parse(format!("Failed to parse Gemini response JSON: {err}"))
                .with_details(text.clone())
        })?;
        parse_generate_response(&value)
    }

    fn request_body(&self, prompt: &str) -> Value {
        build_request(Some(&self.config.system_prompt), prompt, self.config.params)
    }
}

/// Builds a `generateContent` request body.
pub fn build_request(system: Option<&str>, prompt: &str, params: GenerationParams) -> Value {
    let mut body = json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "temperature": params.temperature,
            "topK": params.top_k,
            "topP": params.top_p,
            "maxOutputTokens": params.max_output_tokens,
        }
    });

    if let Some(system) = system
        && !system.trim().is_empty()
    {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn parse_generate_response(value: &Value) -> ProviderResult<String> {
    if let Some(error) = value.get("error") {
        let error_type = error
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("error");
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(ProviderError::api_error(error_type, message));
    }

    Ok(value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

fn build_json_headers(api_key: &str) -> HeaderMap {
    let mut headers = build_headers(api_key);
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers
}

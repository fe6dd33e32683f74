//! Chat session: one conversation with one profile.
//!
//! The session owns everything a question needs (client, profiles, history
//! store) and the state the host UI would otherwise keep in globals: whether
//! the chat is open and which message is currently streaming. Methods take
//! `&mut self`, so a session has at most one request in flight.

use std::fmt;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use super::context::build_prompt;
use crate::config::Config;
use crate::history::ChatStore;
use crate::profile::{Profile, UserProfile};
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::providers::shared::lookup_api_key;
use crate::providers::{ProviderError, ProviderErrorKind};

/// User-facing outcome of a failed question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    MissingApiKey,
    InvalidApiKey,
    QuotaExceeded,
    Connection,
    EmptyResponse,
    Generic,
}

impl Notice {
    /// Maps a provider error onto the notice shown to the user.
    pub fn classify(err: &ProviderError) -> Self {
        let lower = err.message.to_lowercase();
        if err.message.contains("API key") || matches!(err.status, Some(401 | 403)) {
            Notice::InvalidApiKey
        } else if lower.contains("quota")
            || lower.contains("limit")
            || err.status == Some(429)
            || err.message.contains("RESOURCE_EXHAUSTED")
        {
            Notice::QuotaExceeded
        } else if matches!(
            err.kind,
            ProviderErrorKind::Timeout | ProviderErrorKind::Connection
        ) {
            Notice::Connection
        } else {
            Notice::Generic
        }
    }

    /// Retrying cannot change the outcome.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Notice::MissingApiKey
                | Notice::InvalidApiKey
                | Notice::QuotaExceeded
                | Notice::EmptyResponse
        )
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::MissingApiKey => {
                "API key not found. Set GEMINI_API_KEY or api_key in config.toml."
            }
            Notice::InvalidApiKey => "⚠️ Invalid API key. Please update it in config.toml.",
            Notice::QuotaExceeded => {
                "⚠️ API quota exceeded. Please try again later or check your quota at aistudio.google.com"
            }
            Notice::Connection => "⚠️ Connection error. Please check your internet and try again.",
            Notice::EmptyResponse => "⚠️ Received empty response. Please try again.",
            Notice::Generic => "⚠️ Sorry, I encountered an error. Please try again later.",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Terminal message for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Notice {
        notice: Notice,
        /// The underlying provider error, when there was one.
        detail: Option<String>,
    },
}

impl Reply {
    /// Text to place in the assistant bubble.
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) => text,
            Reply::Notice { notice, .. } => notice.message(),
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer(_))
    }
}

/// Result of [`ChatSession::ask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Id of the assistant message the reply belongs to.
    pub message_id: String,
    pub reply: Reply,
    /// Requests sent, including the first.
    pub attempts: u32,
}

pub struct ChatSession {
    client: Option<GeminiClient>,
    profile: Option<Profile>,
    user_profile: Option<UserProfile>,
    store: Option<ChatStore>,
    retry: RetryPolicy,
    stream: bool,
    open: bool,
    streaming_message: Option<String>,
}

impl ChatSession {
    /// Creates an open session. `client` is `None` when no API key is
    /// configured; every question then ends in [`Notice::MissingApiKey`].
    pub fn new(client: Option<GeminiClient>, retry: RetryPolicy, stream: bool) -> Self {
        Self {
            client,
            profile: None,
            user_profile: None,
            store: None,
            retry,
            stream,
            open: true,
            streaming_message: None,
        }
    }

    /// Creates a session from the loaded config.
    ///
    /// # Errors
    /// Returns an error if the configured base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = if lookup_api_key(config.api_key.as_deref(), "GEMINI_API_KEY").is_some() {
            Some(GeminiClient::new(GeminiConfig::from_config(config)?))
        } else {
            None
        };
        Ok(Self::new(
            client,
            RetryPolicy::from_config(config),
            config.stream,
        ))
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_user_profile(mut self, user_profile: Option<UserProfile>) -> Self {
        self.user_profile = user_profile;
        self
    }

    /// Persists successful exchanges into `store`.
    #[must_use]
    pub fn with_store(mut self, store: ChatStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Assistant message currently receiving stream updates.
    pub fn streaming_message_id(&self) -> Option<&str> {
        self.streaming_message.as_deref()
    }

    /// Sends a question and waits for its terminal reply.
    ///
    /// `on_text` receives the full answer text so far: after every streamed
    /// delta, or once with the whole answer in non-streaming mode. After a
    /// retry the snapshots start again from empty.
    ///
    /// # Errors
    /// Fails if the session is closed, or if a successful answer cannot be
    /// saved. Provider failures are reported as [`Reply::Notice`].
    pub async fn ask<F>(&mut self, question: &str, mut on_text: F) -> Result<Exchange>
    where
        F: FnMut(&str),
    {
        if !self.open {
            bail!("Chat session is closed");
        }

        let message_id = format!("msg_{}_ai", Utc::now().timestamp_millis());
        let Some(client) = self.client.as_ref() else {
            return Ok(Exchange {
                message_id,
                reply: Reply::Notice {
                    notice: Notice::MissingApiKey,
                    detail: None,
                },
                attempts: 0,
            });
        };

        let prompt = build_prompt(
            self.user_profile.as_ref(),
            self.profile.as_ref(),
            question,
        );
        self.streaming_message = Some(message_id.clone());

        let mut attempts = 0;
        let reply = loop {
            attempts += 1;
            let result = if self.stream {
                client.stream_generate(&prompt, &mut on_text).await
            } else {
                client.generate(&prompt).await.inspect(|text| on_text(text))
            };

            match result {
                Ok(text) if text.trim().is_empty() => {
                    break Reply::Notice {
                        notice: Notice::EmptyResponse,
                        detail: None,
                    };
                }
                Ok(text) => break Reply::Answer(text),
                Err(err) => {
                    let notice = Notice::classify(&err);
                    let retries_used = attempts - 1;
                    if notice.is_terminal() || retries_used >= self.retry.max_retries {
                        warn!(kind = %err.kind, attempts, "Request failed: {err}");
                        break Reply::Notice {
                            notice,
                            detail: Some(err.message),
                        };
                    }
                    info!(attempt = attempts, "Retrying after error: {err}");
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        };

        self.streaming_message = None;

        if let Reply::Answer(text) = &reply
            && let Some(profile) = self.profile.as_ref()
            && let Some(store) = self.store.as_mut()
        {
            store.append_exchange(&profile.hash(), Some(profile), question, text)?;
        }

        Ok(Exchange {
            message_id,
            reply,
            attempts,
        })
    }
}

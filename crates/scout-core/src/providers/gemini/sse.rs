//! Gemini SSE stream accumulator.
//!
//! Turns the raw byte stream of a `streamGenerateContent?alt=sse` response
//! into growing snapshots of the answer text. Chunk boundaries may fall
//! anywhere, including inside a line or inside a multi-byte character.

use std::fmt;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;

use crate::providers::{ProviderError, ProviderResult};

const LOG_PAYLOAD_LIMIT: usize = 200;

/// Incremental UTF-8 decoder that carries incomplete sequences across chunks.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decodes as much of `chunk` as possible. Invalid bytes become U+FFFD;
    /// an incomplete sequence at the end is held for the next call.
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    } else {
                        self.pending = after.to_vec();
                        break;
                    }
                }
            }
        }
        out
    }

    /// Ends decoding; a dangling partial sequence becomes U+FFFD.
    fn flush(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(char::REPLACEMENT_CHARACTER)
        }
    }
}

/// Per-request accumulation state.
///
/// `buffer` holds the incomplete trailing line; `full_text` only grows.
/// A state is consumed by [`StreamState::finish`] and never reused.
#[derive(Debug, Default)]
pub struct StreamState {
    decoder: Utf8Decoder,
    buffer: String,
    full_text: String,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Feeds one transport chunk. `on_text` receives the full text after
    /// every delta.
    ///
    /// # Errors
    /// Returns an `ApiError` when an event carries an `error` object.
    pub fn feed<F>(&mut self, chunk: &[u8], on_text: &mut F) -> ProviderResult<()>
    where
        F: FnMut(&str),
    {
        let decoded = self.decoder.decode(chunk);
        self.buffer.push_str(&decoded);

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.process_line(&line, on_text)?;
        }
        Ok(())
    }

    /// Ends the stream: flushes the decoder, processes a final unterminated
    /// line, and returns the accumulated text.
    ///
    /// # Errors
    /// Returns an `ApiError` when the final line carries an `error` object.
    pub fn finish<F>(mut self, on_text: &mut F) -> ProviderResult<String>
    where
        F: FnMut(&str),
    {
        if let Some(replacement) = self.decoder.flush() {
            self.buffer.push(replacement);
        }
        let tail = std::mem::take(&mut self.buffer);
        self.process_line(&tail, on_text)?;
        Ok(self.full_text)
    }

    fn process_line<F>(&mut self, line: &str, on_text: &mut F) -> ProviderResult<()>
    where
        F: FnMut(&str),
    {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return Ok(());
        }

        let value = match serde_json::from_str::<Value>(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    payload = truncate_for_log(payload),
                    "Skipping malformed stream event: {err}"
                );
                return Ok(());
            }
        };

        if let Some(error) = value.get("error") {
            let error_type = error
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("error");
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(ProviderError::api_error(error_type, message).with_details(payload));
        }

        if let Some(delta) = value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            && !delta.is_empty()
        {
            self.full_text.push_str(delta);
            on_text(&self.full_text);
        }
        Ok(())
    }
}

fn truncate_for_log(payload: &str) -> &str {
    match payload.char_indices().nth(LOG_PAYLOAD_LIMIT) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}

/// Drives a response byte stream to completion.
///
/// `on_text` is called with the full accumulated text after each delta, in
/// arrival order. Dropping the returned future stops observation.
///
/// # Errors
/// A transport error from the stream becomes a `Connection` error; an error
/// event becomes an `ApiError`. Either aborts accumulation.
pub async fn consume_stream<S, E, F>(stream: S, mut on_text: F) -> ProviderResult<String>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
    F: FnMut(&str),
{
    let mut stream = std::pin::pin!(stream);
    let mut state = StreamState::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| ProviderError::connection(format!("Stream interrupted: {e}")))?;
        state.feed(&chunk, &mut on_text)?;
    }

    state.finish(&mut on_text)
}

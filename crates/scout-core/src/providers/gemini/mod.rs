//! Gemini provider client and stream accumulator.

pub mod api;
pub mod sse;

pub use api::{
    DEFAULT_BASE_URL, GeminiClient, GeminiConfig, GenerationParams, KEY_TEST_PROMPT, build_request,
};
pub use sse::{StreamState, consume_stream};

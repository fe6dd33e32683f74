//! Gemini SSE fixture helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use wiremock::ResponseTemplate;

pub const SSE_TEXT: &str = include_str!("fixtures/gemini_text_response.sse");

/// Path to the sample viewed profile (`https://www.linkedin.com/in/jane-doe/`).
pub fn profile_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/profile_jane.json")
}

/// Hash of the sample profile's URL.
pub const PROFILE_HASH: &str = "-966729278";

pub fn user_profile_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/user_profile.json")
}

/// Two-delta text stream whose accumulated text is `first + second`.
pub fn text_sse(first: &str, second: &str) -> String {
    SSE_TEXT
        .replace("{{FIRST}}", &escape_json(first))
        .replace("{{SECOND}}", &escape_json(second))
}

/// Wrap SSE body string in a ResponseTemplate.
pub fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

/// Convenience: text SSE wrapped in ResponseTemplate.
pub fn text_response(first: &str, second: &str) -> ResponseTemplate {
    sse_response(&text_sse(first, second))
}

/// Google-style error body with the given status.
pub fn error_response(status: u16, message: &str, reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": { "code": status, "message": message, "status": reason }
    }))
}

/// Escape special characters for JSON string embedding.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

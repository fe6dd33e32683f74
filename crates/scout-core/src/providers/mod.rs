//! Generative-language providers.

pub mod gemini;
pub mod shared;

pub use shared::{
    ProviderError, ProviderErrorKind, ProviderResult, resolve_api_key, resolve_base_url,
};

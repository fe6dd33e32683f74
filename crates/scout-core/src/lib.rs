//! Core scout library (markdown, streaming, providers, history, config).

pub mod config;
pub mod core;
pub mod datefmt;
pub mod history;
pub mod markdown;
pub mod profile;
pub mod providers;

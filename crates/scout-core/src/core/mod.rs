//! Core module: UI-agnostic chat domain.
//!
//! This module contains:
//! - `context`: Prompt assembly from user and viewed profiles
//! - `session`: Chat session with bounded retry and user-facing notices

pub mod context;
pub mod session;

pub use session::{ChatSession, Exchange, Notice, Reply, RetryPolicy};

//! CLI command handlers.

pub mod ask;
pub mod config;
pub mod history;
pub mod render;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Reads a file, or stdin when `path` is `None`.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            Ok(buf)
        }
    }
}

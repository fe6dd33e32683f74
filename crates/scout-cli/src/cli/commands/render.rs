//! Render command handler.

use std::path::Path;

use anyhow::Result;
use scout_core::markdown;

pub fn run(file: Option<&Path>, strip: bool) -> Result<()> {
    let source = super::read_input(file)?;
    let output = if strip {
        markdown::strip(&source)
    } else {
        markdown::render(&source)
    };
    println!("{output}");
    Ok(())
}

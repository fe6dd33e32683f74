//! Markdown handling for assistant replies.
//!
//! `render` turns model output into an HTML fragment that is safe to inject
//! into a chat bubble. `strip` removes the same syntax for plain-text
//! consumers (copy-to-clipboard, speech, sharing).
//!
//! Both functions are total: malformed or unbalanced markdown degrades to
//! literal characters.

mod code;
mod render;
mod strip;

pub use render::render;
pub use strip::strip;

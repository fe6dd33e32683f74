//! Placeholder stash that shields code spans from line-oriented rules.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

const BLOCK_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';
const INLINE_OPEN: char = '\u{E002}';

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\x{E000}\x{E002}])(\d+)\x{E001}").expect("valid placeholder regex")
});

/// Removes the private-use sentinels from untrusted input.
pub(super) fn scrub(text: &str) -> Cow<'_, str> {
    if text.contains([BLOCK_OPEN, PLACEHOLDER_CLOSE, INLINE_OPEN]) {
        Cow::Owned(
            text.chars()
                .filter(|c| !matches!(*c, BLOCK_OPEN | PLACEHOLDER_CLOSE | INLINE_OPEN))
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

/// Holds already-rendered code fragments while the rest of the pipeline runs.
#[derive(Debug, Default)]
pub(super) struct CodeStash {
    blocks: Vec<String>,
    inline: Vec<String>,
}

impl CodeStash {
    pub(super) fn block(&mut self, fragment: String) -> String {
        self.blocks.push(fragment);
        format!("{BLOCK_OPEN}{}{PLACEHOLDER_CLOSE}", self.blocks.len() - 1)
    }

    pub(super) fn inline(&mut self, fragment: String) -> String {
        self.inline.push(fragment);
        format!("{INLINE_OPEN}{}{PLACEHOLDER_CLOSE}", self.inline.len() - 1)
    }

    /// True when the line begins with a stashed code block.
    pub(super) fn is_block_line(line: &str) -> bool {
        line.starts_with(BLOCK_OPEN)
    }

    pub(super) fn restore(&self, text: &str) -> String {
        if self.blocks.is_empty() && self.inline.is_empty() {
            return text.to_string();
        }

        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                let slots = if caps[1].starts_with(BLOCK_OPEN) {
                    &self.blocks
                } else {
                    &self.inline
                };
                caps[2]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| slots.get(idx))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_replaces_each_placeholder_with_its_fragment() {
        let mut stash = CodeStash::default();
        let block = stash.block("<pre>a</pre>".to_string());
        let inline = stash.inline("<code>b</code>".to_string());

        let text = format!("{block}\nx {inline} y");
        assert!(CodeStash::is_block_line(&text));
        assert_eq!(stash.restore(&text), "<pre>a</pre>\nx <code>b</code> y");
    }

    #[test]
    fn scrub_drops_sentinels_from_input() {
        let dirty = format!("a{BLOCK_OPEN}0{PLACEHOLDER_CLOSE}b");
        assert_eq!(scrub(&dirty), "a0b");
        assert!(matches!(scrub("clean"), Cow::Borrowed("clean")));
    }
}

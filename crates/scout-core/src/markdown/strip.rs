//! Markdown → plain text.
//!
//! Every marker class understood by [`super::render`] has a matching rule
//! here. Adding syntax to the renderer means adding a rule to this table.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::code::{self, CodeStash};

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:[\w+#.-]*\n)?([^`]+)```").expect("valid fenced code regex")
});
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid inline code regex"));
static HORIZONTAL_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:-{3,}|\*{3,})[ \t]*$").expect("valid horizontal rule regex")
});
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*]|\d+\.)[ \t]+").expect("valid list marker regex")
});
static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>[ \t]?").expect("valid blockquote regex"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+").expect("valid header regex"));
static BOLD_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^\s*](?:.*?[^\s*])?)\*\*").expect("valid bold regex"));
static BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b__([^\s_](?:.*?[^\s_])?)__\b").expect("valid bold regex"));
static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^\s*](?:.*?[^\s*])?)\*").expect("valid italic regex"));
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^\s_](?:.*?[^\s_])?)_\b").expect("valid italic regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid link regex"));
static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Removes markdown syntax while keeping the underlying text.
pub fn strip(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = code::scrub(text).replace("\r\n", "\n");
    let mut stash = CodeStash::default();

    // Code first so its content is not touched by the other rules.
    let out = FENCED_CODE.replace_all(&text, |caps: &Captures<'_>| {
        stash.block(caps[1].trim_end_matches('\n').to_string())
    });
    let out = INLINE_CODE
        .replace_all(&out, |caps: &Captures<'_>| stash.inline(caps[1].to_string()))
        .into_owned();

    let out = HORIZONTAL_RULE.replace_all(&out, "");
    let out = LIST_MARKER.replace_all(&out, "");
    let out = BLOCKQUOTE.replace_all(&out, "");
    let out = HEADER.replace_all(&out, "");
    let out = BOLD_STAR.replace_all(&out, "${1}");
    let out = BOLD_UNDERSCORE.replace_all(&out, "${1}");
    let out = ITALIC_STAR.replace_all(&out, "${1}");
    let out = ITALIC_UNDERSCORE.replace_all(&out, "${1}");
    let out = LINK.replace_all(&out, "${1}");

    let out = stash.restore(&out);
    EXTRA_BLANK_LINES
        .replace_all(&out, "\n\n")
        .trim()
        .to_string()
}

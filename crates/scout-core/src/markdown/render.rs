//! Markdown → HTML rendering.
//!
//! The renderer is a fixed table of rules applied in order:
//!
//! 1. escape `&`, `<`, `>` (first, so tags inserted later survive)
//! 2. headers, `######` down to `#`
//! 3. emphasis, bold before italic
//! 4. code, fenced before inline (stashed behind placeholders)
//! 5. links
//! 6. lists
//! 7. blockquotes
//! 8. horizontal rules
//! 9. paragraphs and line breaks, then the `<br>` cleanup and paragraph wrap
//!
//! Each rule relies on the side effects of the rules before it. Reordering the
//! table changes output; the tests below pin the precedence cases.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::code::{self, CodeStash};

type Rule = fn(&str, &mut CodeStash) -> String;

const PIPELINE: &[(&str, Rule)] = &[
    ("escape", escape_html),
    ("headers", headers),
    ("emphasis", emphasis),
    ("code", code_spans),
    ("links", links),
    ("lists", lists),
    ("blockquotes", blockquotes),
    ("horizontal_rules", horizontal_rules),
    ("paragraphs", paragraphs),
];

static HEADERS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    (1..=6)
        .rev()
        .map(|level| {
            let pattern = format!(r"(?m)^#{{{level}}}[ \t]+(.+)$");
            let regex = Regex::new(&pattern).expect("valid header regex");
            (regex, format!("<h{level}>${{1}}</h{level}>"))
        })
        .collect()
});

static BOLD_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^\s*](?:.*?[^\s*])?)\*\*").expect("valid bold regex"));
static BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b__([^\s_](?:.*?[^\s_])?)__\b").expect("valid bold regex"));
static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^\s*](?:.*?[^\s*])?)\*").expect("valid italic regex"));
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^\s_](?:.*?[^\s_])?)_\b").expect("valid italic regex"));

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:[\w+#.-]*\n)?([^`]+)```").expect("valid fenced code regex")
});
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid inline code regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid link regex"));

static NESTED_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]{2,}[-*][ \t]+(.+)$").expect("valid list regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ ?[-*][ \t]+(.+)$").expect("valid list regex"));
static ORDERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\d+\.[ \t]+(.+)$").expect("valid list regex"));

static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^&gt;[ \t]?(.+)$").expect("valid blockquote regex")
});

static HORIZONTAL_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:-{3,}|\*{3,})[ \t]*$").expect("valid horizontal rule regex")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(?:h[1-6]|ul|ol|pre|blockquote|table|hr)\b").expect("valid block tag regex")
});

static BREAK_BEFORE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<br>)+(</?(?:ul|ol|li)>)").expect("valid cleanup regex")
});
static BREAK_AFTER_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(</?(?:ul|ol|li)>)(?:<br>)+").expect("valid cleanup regex")
});

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Renders markdown into an HTML fragment.
///
/// Every `<`, `>` and `&` from the input is escaped exactly once before any
/// tag is produced, so model output cannot inject markup.
pub fn render(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut stash = CodeStash::default();
    let mut html = text.to_string();
    for (_name, rule) in PIPELINE {
        html = rule(&html, &mut stash);
    }
    stash.restore(&html)
}

fn escape_html(text: &str, _stash: &mut CodeStash) -> String {
    let text = code::scrub(text);
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn headers(text: &str, _stash: &mut CodeStash) -> String {
    let mut out = text.to_string();
    for (regex, replacement) in HEADERS.iter() {
        out = regex.replace_all(&out, replacement.as_str()).into_owned();
    }
    out
}

fn emphasis(text: &str, _stash: &mut CodeStash) -> String {
    let out = BOLD_STAR.replace_all(text, "<strong>${1}</strong>");
    let out = BOLD_UNDERSCORE.replace_all(&out, "<strong>${1}</strong>");
    let out = ITALIC_STAR.replace_all(&out, "<em>${1}</em>");
    ITALIC_UNDERSCORE
        .replace_all(&out, "<em>${1}</em>")
        .into_owned()
}

fn code_spans(text: &str, stash: &mut CodeStash) -> String {
    let out = FENCED_CODE.replace_all(text, |caps: &Captures<'_>| {
        let body = caps[1].trim_end_matches('\n');
        stash.block(format!("<pre><code>{body}</code></pre>"))
    });
    INLINE_CODE
        .replace_all(&out, |caps: &Captures<'_>| {
            stash.inline(format!("<code>{}</code>", &caps[1]))
        })
        .into_owned()
}

fn links(text: &str, _stash: &mut CodeStash) -> String {
    LINK.replace_all(text, |caps: &Captures<'_>| {
        let label = &caps[1];
        let url = &caps[2];
        if is_unsafe_url(url) {
            return label.to_string();
        }
        let href = url.replace('"', "&quot;");
        format!(r#"<a href="{href}" target="_blank" rel="noopener noreferrer">{label}</a>"#)
    })
    .into_owned()
}

fn is_unsafe_url(url: &str) -> bool {
    let normalized = url.trim().to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

#[derive(Debug)]
enum ListItem<'a> {
    Nested(&'a str),
    Bullet(&'a str),
    Ordered(&'a str),
}

impl<'a> ListItem<'a> {
    /// Indented bullets are matched before top-level ones.
    fn parse(line: &'a str) -> Option<Self> {
        if let Some(text) = first_capture(&NESTED_BULLET, line) {
            return Some(ListItem::Nested(text));
        }
        if let Some(text) = first_capture(&BULLET, line) {
            return Some(ListItem::Bullet(text));
        }
        first_capture(&ORDERED, line).map(ListItem::Ordered)
    }
}

fn first_capture<'a>(regex: &Regex, line: &'a str) -> Option<&'a str> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Collects consecutive list lines into one container.
#[derive(Debug, Default)]
struct ListBuilder {
    kind: Option<ListKind>,
    html: String,
    item_open: bool,
    nested_open: bool,
}

impl ListBuilder {
    /// Adds an item. Returns a finished list when the item starts a list of a
    /// different kind.
    fn push(&mut self, item: &ListItem<'_>) -> Option<String> {
        match item {
            ListItem::Nested(text) => {
                if self.kind.is_none() {
                    self.open(ListKind::Unordered);
                }
                if !self.nested_open {
                    if !self.item_open {
                        self.html.push_str("<li>");
                        self.item_open = true;
                    }
                    self.html.push_str("<ul>");
                    self.nested_open = true;
                }
                self.html.push_str("<li>");
                self.html.push_str(text);
                self.html.push_str("</li>");
                None
            }
            ListItem::Bullet(text) => self.push_top_level(ListKind::Unordered, text),
            ListItem::Ordered(text) => self.push_top_level(ListKind::Ordered, text),
        }
    }

    fn push_top_level(&mut self, kind: ListKind, text: &str) -> Option<String> {
        let finished = if self.kind.is_some_and(|current| current != kind) {
            self.finish()
        } else {
            None
        };

        if self.kind.is_none() {
            self.open(kind);
        }
        self.close_nested();
        self.close_item();
        self.html.push_str("<li>");
        self.html.push_str(text);
        self.item_open = true;
        finished
    }

    fn open(&mut self, kind: ListKind) {
        self.kind = Some(kind);
        self.html.push('<');
        self.html.push_str(kind.tag());
        self.html.push('>');
    }

    fn close_nested(&mut self) {
        if self.nested_open {
            self.html.push_str("</ul>");
            self.nested_open = false;
        }
    }

    fn close_item(&mut self) {
        if self.item_open {
            self.html.push_str("</li>");
            self.item_open = false;
        }
    }

    fn finish(&mut self) -> Option<String> {
        let kind = self.kind.take()?;
        self.close_nested();
        self.close_item();
        self.html.push_str("</");
        self.html.push_str(kind.tag());
        self.html.push('>');
        Some(std::mem::take(&mut self.html))
    }
}

fn lists(text: &str, _stash: &mut CodeStash) -> String {
    let mut lines = Vec::new();
    let mut builder = ListBuilder::default();

    for line in text.split('\n') {
        if let Some(item) = ListItem::parse(line) {
            if let Some(finished) = builder.push(&item) {
                lines.push(finished);
            }
        } else {
            if let Some(finished) = builder.finish() {
                lines.push(finished);
            }
            lines.push(line.to_string());
        }
    }
    if let Some(finished) = builder.finish() {
        lines.push(finished);
    }

    lines.join("\n")
}

fn blockquotes(text: &str, _stash: &mut CodeStash) -> String {
    BLOCKQUOTE
        .replace_all(text, "<blockquote>${1}</blockquote>")
        .into_owned()
}

fn horizontal_rules(text: &str, _stash: &mut CodeStash) -> String {
    HORIZONTAL_RULE.replace_all(text, "<hr>").into_owned()
}

/// Blank lines split paragraphs, single newlines become `<br>`. Block-level
/// lines stand on their own so paragraphs never wrap lists or headings.
fn paragraphs(text: &str, _stash: &mut CodeStash) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.trim().is_empty() {
            flush_paragraph(&mut out, &mut paragraph);
        } else if is_block_line(line) {
            flush_paragraph(&mut out, &mut paragraph);
            out.push_str(line);
        } else {
            paragraph.push(line);
        }
    }
    flush_paragraph(&mut out, &mut paragraph);

    let out = BREAK_BEFORE_LIST.replace_all(&out, "${1}");
    BREAK_AFTER_LIST.replace_all(&out, "${1}").into_owned()
}

fn is_block_line(line: &str) -> bool {
    CodeStash::is_block_line(line) || BLOCK_TAG.is_match(line)
}

fn flush_paragraph(out: &mut String, paragraph: &mut Vec<&str>) {
    if paragraph.is_empty() {
        return;
    }
    out.push_str("<p>");
    out.push_str(&paragraph.join("<br>"));
    out.push_str("</p>");
    paragraph.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_renders_nothing() {
        assert_eq!(render(""), "");
        assert_eq!(render("\n\n"), "");
    }

    #[test]
    fn test_plain_text_is_wrapped_in_paragraph() {
        assert_eq!(render("hello world"), "<p>hello world</p>");
    }

    #[test]
    fn test_html_is_escaped_exactly_once() {
        assert_eq!(render("5 < 6 & 7 > 3"), "<p>5 &lt; 6 &amp; 7 &gt; 3</p>");
        assert_eq!(render("&amp;"), "<p>&amp;amp;</p>");

        let html = render("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("&amp;lt;"));
    }

    #[test]
    fn test_literal_block_tags_in_input_are_not_blocks() {
        assert_eq!(
            render("<h1>fake</h1>"),
            "<p>&lt;h1&gt;fake&lt;/h1&gt;</p>"
        );
    }

    #[test]
    fn test_header_levels_pick_the_longest_run() {
        assert_eq!(render("###### h6"), "<h6>h6</h6>");
        assert_eq!(render("### h3"), "<h3>h3</h3>");
        assert_eq!(render("# h1"), "<h1>h1</h1>");
        assert_eq!(render("####### seven"), "<p>####### seven</p>");
        assert_eq!(render("#nospace"), "<p>#nospace</p>");
    }

    #[test]
    fn test_header_followed_by_text() {
        assert_eq!(
            render("# Title\nBody text"),
            "<h1>Title</h1><p>Body text</p>"
        );
    }

    #[test]
    fn test_bold_is_consumed_before_italic() {
        assert_eq!(
            render("**bold** and *italic*"),
            "<p><strong>bold</strong> and <em>italic</em></p>"
        );
        assert_eq!(
            render("**a *b* c**"),
            "<p><strong>a <em>b</em> c</strong></p>"
        );
    }

    #[test]
    fn test_underscore_emphasis_leaves_identifiers_alone() {
        assert_eq!(
            render("__b__ _i_ snake_case_name"),
            "<p><strong>b</strong> <em>i</em> snake_case_name</p>"
        );
    }

    #[test]
    fn test_unbalanced_markers_stay_literal() {
        assert_eq!(
            render("**unclosed and `tick"),
            "<p>**unclosed and `tick</p>"
        );
        assert_eq!(render("```\nnever closed"), "<p>```<br>never closed</p>");
    }

    #[test]
    fn test_fenced_code_drops_language_tag() {
        assert_eq!(
            render("```rust\nlet x = 1;\n```"),
            "<pre><code>let x = 1;</code></pre>"
        );
    }

    #[test]
    fn test_fenced_code_shields_content_from_line_rules() {
        let html = render("```\n- not a list\n\n---\n```");
        assert_eq!(html, "<pre><code>- not a list\n\n---</code></pre>");
        assert!(!html.contains("<ul>"));
        assert!(!html.contains("<hr>"));
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(
            render("use `cargo build` now"),
            "<p>use <code>cargo build</code> now</p>"
        );
    }

    #[test]
    fn test_links_open_in_new_context() {
        assert_eq!(
            render("[docs](https://example.com)"),
            r#"<p><a href="https://example.com" target="_blank" rel="noopener noreferrer">docs</a></p>"#
        );
    }

    #[test]
    fn test_unsafe_link_schemes_render_label_only() {
        let html = render("[click](javascript:alert)");
        assert_eq!(html, "<p>click</p>");
        assert!(!html.contains("href"));

        assert_eq!(render("[x](DATA:text/html)"), "<p>x</p>");
    }

    #[test]
    fn test_link_href_quotes_are_escaped() {
        let html = render(r#"[x](https://a.example/"onmouseover)"#);
        assert!(html.contains(r#"href="https://a.example/&quot;onmouseover""#));
    }

    #[test]
    fn test_three_bullets_share_one_list() {
        let html = render("- one\n- two\n* three");
        assert_eq!(html, "<ul><li>one</li><li>two</li><li>three</li></ul>");
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("<li>").count(), 3);
    }

    #[test]
    fn test_nested_bullets_wrap_inside_parent_item() {
        assert_eq!(
            render("- a\n  - b\n  - c\n- d"),
            "<ul><li>a<ul><li>b</li><li>c</li></ul></li><li>d</li></ul>"
        );
    }

    #[test]
    fn test_nested_bullets_without_parent() {
        assert_eq!(
            render("  - orphan"),
            "<ul><li><ul><li>orphan</li></ul></li></ul>"
        );
    }

    #[test]
    fn test_ordered_items_get_ordered_container() {
        assert_eq!(
            render("1. one\n2. two"),
            "<ol><li>one</li><li>two</li></ol>"
        );
    }

    #[test]
    fn test_switching_list_kind_closes_previous_list() {
        assert_eq!(
            render("- a\n1. b"),
            "<ul><li>a</li></ul><ol><li>b</li></ol>"
        );
    }

    #[test]
    fn test_bullet_with_emphasis_keeps_marker_semantics() {
        assert_eq!(
            render("* an *important* item"),
            "<ul><li>an <em>important</em> item</li></ul>"
        );
    }

    #[test]
    fn test_lists_have_no_adjacent_line_breaks() {
        let html = render("Intro\n- a\n- b\nOutro");
        assert_eq!(html, "<p>Intro</p><ul><li>a</li><li>b</li></ul><p>Outro</p>");
        assert!(!html.contains("<br><ul>"));
        assert!(!html.contains("</li><br>"));
        assert!(!html.contains("</ul><br>"));
    }

    #[test]
    fn test_blockquote_lines_are_wrapped_individually() {
        assert_eq!(render("> quoted"), "<blockquote>quoted</blockquote>");
        assert_eq!(
            render("> one\n> two"),
            "<blockquote>one</blockquote><blockquote>two</blockquote>"
        );
    }

    #[test]
    fn test_horizontal_rules() {
        assert_eq!(
            render("above\n\n---\n\nbelow"),
            "<p>above</p><hr><p>below</p>"
        );
        assert_eq!(render("***"), "<hr>");
    }

    #[test]
    fn test_paragraphs_and_line_breaks() {
        assert_eq!(
            render("line one\nline two\n\nnext"),
            "<p>line one<br>line two</p><p>next</p>"
        );
        assert_eq!(render("a\r\nb"), "<p>a<br>b</p>");
    }

    #[test]
    fn test_pipeline_order_is_stable() {
        let names: Vec<&str> = PIPELINE.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [
                "escape",
                "headers",
                "emphasis",
                "code",
                "links",
                "lists",
                "blockquotes",
                "horizontal_rules",
                "paragraphs",
            ]
        );
    }
}

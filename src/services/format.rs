// src/services/format.rs
use std::sync::LazyLock;

use regex::Regex;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
// Escaped content has no raw `<`, so any `<` here opens a tag from the bold
// pass. Italics must not straddle it.
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n<]+?)\*").unwrap());

/// Render the supported markdown subset (`**bold**`, `*italic*`, newlines)
/// as HTML. Content is escaped before any tag is introduced, and the rewrite
/// order matters: bold must consume `**` before italic sees single `*`, and
/// line breaks come last so neither pattern spans lines.
pub fn format_message(content: &str) -> String {
    let escaped = escape_html(content);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC.replace_all(&bold, "<em>$1</em>");
    italic.replace('\n', "<br>")
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::fields::scalar_text;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

/// Bullet glyph, plus the form it takes when UTF-8 was decoded as cp1252.
const BULLETS: &[&str] = &["\u{2022}", "\u{e2}\u{20ac}\u{a2}"];

/// Strip markup from a description field and tidy it for a CSV cell.
///
/// Tags go first so a bullet inside a stripped tag never leaks through,
/// then newline runs collapse, then bullets become `- `.
pub fn clean_html(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    let mut text = NEWLINES_RE.replace_all(&stripped, "\n").trim().to_string();
    for bullet in BULLETS {
        text = text.replace(bullet, "- ");
    }
    text.trim().to_string()
}

/// Clean a JSON field if it is a string. Other scalars pass through as-is;
/// anything absent or non-scalar becomes `default`.
pub fn clean_value(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => clean_html(s),
        Some(other) => scalar_text(other).unwrap_or_else(|| default.to_string()),
        None => default.to_string(),
    }
}

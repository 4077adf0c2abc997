//! Conversion of multi-line user input into a single delimited parameter value.
//!
//! Lines are split on `\n`, trimmed, optionally sanitized, filtered for
//! emptiness and joined with the configured separator. The result is computed
//! fresh for every dispatch and never cached.
//!
//! Word boundaries and case folding are ASCII-only, and the whitespace set is
//! the one browsers use for `\s` and `String.prototype.trim`, so output matches
//! the dashboard's own text handling byte for byte.

use regex::Regex;

use crate::settings::Settings;

lazy_static::lazy_static! {
    /// Reserved keywords stripped as whole ASCII words, ASCII case-insensitively.
    static ref SQL_KEYWORDS: Regex = Regex::new(
        r"(?i-u)\b(SELECT|INSERT|UPDATE|DELETE|DROP|UNION|ALTER|CREATE|TRUNCATE|INTO|FROM|WHERE|TABLE)\b"
    )
    .unwrap();
    static ref SQL_CHARACTERS: Regex = Regex::new(r#"[;'"\\]"#).unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(
        r"[\t\n\x0B\x0C\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}]+"
    )
    .unwrap();
}

/// Whitespace as the dashboard's script engine defines it. Unlike
/// [`char::is_whitespace`] it includes U+FEFF and excludes U+0085.
fn is_text_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' '
            | '\u{A0}' | '\u{1680}' | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

fn trim_text(text: &str) -> &str {
    text.trim_matches(is_text_whitespace)
}

/// Turn raw textbox content into the value sent to the parameter.
///
/// Zero surviving lines yields an empty string, which is a valid result.
pub fn process(raw_text: &str, settings: &Settings) -> String {
    let sanitize_lines = settings.sanitization_enabled();
    let separator = settings.effective_separator();

    let processed = raw_text
        .split('\n')
        .map(|line| {
            let trimmed = trim_text(line);
            if sanitize_lines { sanitize(trimmed) } else { trimmed.to_string() }
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(separator);

    tracing::debug!(
        original = raw_text,
        processed = %processed,
        sanitized = sanitize_lines,
        separator,
        "Processed text input"
    );
    processed
}

/// Best-effort denylist strip of SQL keywords and quoting characters.
///
/// Pass order is fixed: keywords, then characters, then whitespace collapse,
/// then trim. Changing it changes the output for inputs like `"DROP;TABLE"`.
pub fn sanitize(text: &str) -> String {
    let without_keywords = SQL_KEYWORDS.replace_all(text, "");
    let without_chars = SQL_CHARACTERS.replace_all(&without_keywords, "");
    let collapsed = WHITESPACE_RUN.replace_all(&without_chars, " ");
    trim_text(&collapsed).to_string()
}

/// [`sanitize`] for loosely typed values arriving from the UI layer.
/// Anything that is not a JSON string sanitizes to the empty string.
pub fn sanitize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => sanitize(s),
        _ => String::new(),
    }
}

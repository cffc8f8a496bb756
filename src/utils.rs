//! Utility functions for mail text handling.
//!
//! This module provides shared helpers for truncating bodies and rendering replies.

/// Last `max_chars` characters of a string, respecting char boundaries.
///
/// # Arguments
///
/// * `text` - Source text
/// * `max_chars` - Maximum number of characters to keep
///
/// # Returns
///
/// The whole text when it is short enough, otherwise its tail.
#[must_use]
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    text.char_indices()
        .nth(skip)
        .map_or("", |(index, _)| &text[index..])
}

/// Render a plain-text reply as simple mail HTML.
///
/// Escapes `&`, `<` and `>`. Lines starting with `---` or `===` become a rule,
/// other non-empty lines become a `<div>` with `http` tokens turned into links,
/// and empty lines become `<br>`.
#[must_use]
pub fn text_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    escaped
        .split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with("---") || trimmed.starts_with("===") {
                "<hr>".to_string()
            } else if trimmed.is_empty() {
                "<br>".to_string()
            } else {
                let linked = line
                    .split(' ')
                    .map(|part| {
                        if part.starts_with("http") {
                            format!("<a href=\"{part}\">{part}</a>")
                        } else {
                            part.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("<div>{linked}</div>")
            }
        })
        .collect()
}

//! Length and line limits for composed text.
//!
//! Limits count `char`s, so a cut never lands inside a multi-byte sequence.
//! A limit of `0` disables that limit. When text is cut, the omission marker is
//! appended and the result, marker included, stays within the character limit.
//! Everything before the marker is a prefix of the input.

use postwatch_core::FormatLimits;

/// Truncate `text` to at most `max` characters, ending in `marker` when cut.
///
/// If `marker` alone is longer than `max`, the text is cut to `max`
/// characters with no marker.
pub fn truncate_chars(text: &str, max: usize, marker: &str) -> String {
    if max == 0 || text.chars().count() <= max {
        return text.to_string();
    }
    cut_with_marker(text, max, marker)
}

/// Apply the line limit, then the character limit, to a post message.
pub fn truncate_message(message: &str, limits: &FormatLimits) -> String {
    let marker = limits.omission_marker.as_str();
    let max_len = limits.max_message_length;

    let (text, lines_cut) = keep_lines(message, limits.max_message_line);
    let over_length = max_len > 0 && text.chars().count() > max_len;
    if !lines_cut && !over_length {
        return text;
    }

    if max_len == 0 || text.chars().count() + marker.chars().count() <= max_len {
        return format!("{text}{marker}");
    }
    cut_with_marker(&text, max_len, marker)
}

/// First `max_lines` lines of `text`, and whether anything was dropped.
/// A single trailing newline does not start another line.
fn keep_lines(text: &str, max_lines: usize) -> (String, bool) {
    if max_lines == 0 {
        return (text.to_string(), false);
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut lines = body.split('\n');
    let kept: Vec<&str> = lines.by_ref().take(max_lines).collect();
    if lines.next().is_none() {
        return (text.to_string(), false);
    }
    (kept.join("\n"), true)
}

fn cut_with_marker(text: &str, max: usize, marker: &str) -> String {
    let marker_len = marker.chars().count();
    if marker_len > max {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - marker_len).collect();
    out.push_str(marker);
    out
}

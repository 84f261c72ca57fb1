//! Speech text preparation.
//!
//! Synthesizers read "013" digit by digit and run straight through
//! "Artist - Title", so text is normalized before it is spoken.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Characters replaced by a comma so the synthesizer pauses.
const PAUSE_CHARS: &[char] = &['-', '\u{2010}', '\u{2011}', '\u{2013}', '\u{2014}'];

/// Normalize `text` for speaking.
///
/// - hyphens and dashes become commas (forces a pause)
/// - whitespace runs collapse to one space, ends are trimmed
/// - leading zeros are dropped from all-digit tokens of two or more digits
///
/// Total and idempotent.
pub fn prepare(text: &str) -> String {
    let paused: String = text
        .chars()
        .map(|c| if PAUSE_CHARS.contains(&c) { ',' } else { c })
        .collect();
    let collapsed = WHITESPACE.replace_all(paused.trim(), " ");

    collapsed
        .split(' ')
        .map(strip_leading_zeros)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_leading_zeros(token: &str) -> &str {
    if token.len() < 2 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return token;
    }
    let trimmed = token.trim_start_matches('0');
    if trimmed.is_empty() {
        // "00" is still zero
        &token[token.len() - 1..]
    } else {
        trimmed
    }
}

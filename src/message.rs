//! Message text and its wrapped LCD lines.
//!
//! A message is wrapped once, when it is set, into lines one character
//! narrower than the display (the last column is left blank so the text never
//! touches the edge). The scroll engine then only indexes into the result.

use crate::MAX_MESSAGE_LEN;

/// Split `text` into lines of at most `width - 1` characters.
///
/// When a line fills up, it is broken at the last space seen in it and that
/// space is dropped; with no usable space the line is hard-broken. A space in
/// the first position of a line is never used as a break point, which would
/// produce an empty line.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let limit = width.saturating_sub(1).max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = start + limit;
        if end >= chars.len() {
            lines.push(chars[start..].iter().collect());
            break;
        }

        // The character right after a full line counts: if it is a space
        // the line breaks cleanly at full length.
        let break_at = chars[start + 1..=end]
            .iter()
            .rposition(|&c| c == ' ')
            .map(|offset| start + 1 + offset);

        match break_at {
            Some(space) => {
                lines.push(chars[start..space].iter().collect());
                start = space + 1;
            }
            None => {
                lines.push(chars[start..end].iter().collect());
                start = end;
            }
        }
    }

    lines
}

/// Truncate `text` to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// The current LCD message: raw text plus its wrapped lines.
///
/// Rebuilt wholesale whenever the text changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayMessage {
    text: String,
    lines: Vec<String>,
}

impl DisplayMessage {
    pub fn new(text: &str, width: usize) -> Self {
        let text = truncate_chars(text, MAX_MESSAGE_LEN).to_string();
        let lines = wrap_lines(&text, width);
        Self { text, lines }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Only a message with at least one line is scrolled.
    pub fn is_enabled(&self) -> bool {
        !self.lines.is_empty()
    }
}

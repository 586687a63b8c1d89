//! Context window assembly for upstream calls

mod window;

pub use window::{ContextWindow, ContextWindowManager};

use serde::{Deserialize, Serialize};

/// How a context window was derived from the full candidate sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    pub original_chars: usize,
    pub final_chars: usize,
    pub dropped_messages: usize,
    pub trimmed: bool,
    pub summarized_entries: usize,
}

impl ContextStats {
    pub fn chars_saved(&self) -> usize {
        self.original_chars.saturating_sub(self.final_chars)
    }
}

/// Longest prefix of `text` with at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

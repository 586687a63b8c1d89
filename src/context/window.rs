//! Bounded message-sequence assembly

use super::{truncate_chars, ContextStats};
use crate::api::Message;
use crate::config::ContextSettings;
use crate::models::MemoryEntry;
use tracing::debug;

/// Messages to send upstream, plus how they were derived
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    pub messages: Vec<Message>,
    pub stats: ContextStats,
}

/// Keeps the message sequence for one call under a character budget.
///
/// The full sequence (system, one message per memory entry, the whole history,
/// the user turn) is sent untouched when it fits. Trimming only happens past
/// the budget: memory collapses into a single summary line and history is cut
/// to the most recent turns. The system message and the user turn always survive.
#[derive(Debug, Clone)]
pub struct ContextWindowManager {
    settings: ContextSettings,
}

fn total_chars(messages: &[Message]) -> usize {
    messages.iter().map(Message::char_len).sum()
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

impl ContextWindowManager {
    pub fn new(settings: ContextSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// `Recent interactions: s1 | s2 | s3` over the newest memory entries
    pub fn summarize_memory(&self, memory: &[MemoryEntry]) -> Option<(Message, usize)> {
        if memory.is_empty() || self.settings.memory_summary_entries == 0 {
            return None;
        }

        let recent = &memory[memory.len().saturating_sub(self.settings.memory_summary_entries)..];
        let parts: Vec<String> = recent
            .iter()
            .map(|entry| {
                let cut = truncate_chars(&entry.response, self.settings.summary_chars);
                if cut.len() < entry.response.len() {
                    format!("{cut}...")
                } else {
                    cut.to_string()
                }
            })
            .collect();

        Some((
            Message::system(format!("Recent interactions: {}", parts.join(" | "))),
            recent.len(),
        ))
    }

    pub fn build(
        &self,
        system_prompt: &str,
        history: &[Message],
        memory: &[MemoryEntry],
        user_turn: &str,
        optimize: bool,
    ) -> ContextWindow {
        let system = Message::system(system_prompt);
        let user = Message::user(user_turn);

        let mut naive = Vec::with_capacity(memory.len() + history.len() + 2);
        naive.push(system.clone());
        naive.extend(memory.iter().map(|entry| Message::system(entry.response.clone())));
        naive.extend(history.iter().cloned());
        naive.push(user.clone());
        let original_chars = total_chars(&naive);

        if !optimize {
            let mut messages = vec![system];
            messages.extend(tail(history, self.settings.recent_turns));
            messages.push(user);
            return self.finish(messages, naive.len(), original_chars, 0);
        }

        if original_chars <= self.settings.budget_chars {
            let final_chars = original_chars;
            return ContextWindow {
                messages: naive,
                stats: ContextStats {
                    original_chars,
                    final_chars,
                    dropped_messages: 0,
                    trimmed: false,
                    summarized_entries: 0,
                },
            };
        }

        let mut summary = self.summarize_memory(memory);
        let mut recent = tail(history, self.settings.recent_turns);

        let fixed = system.char_len() + user.char_len();
        let summary_len = |s: &Option<(Message, usize)>| s.as_ref().map_or(0, |(m, _)| m.char_len());

        // oldest history goes first, then the summary
        while fixed + summary_len(&summary) + total_chars(&recent) > self.settings.budget_chars
            && !recent.is_empty()
        {
            recent.remove(0);
        }
        if fixed + summary_len(&summary) > self.settings.budget_chars {
            summary = None;
        }

        let summarized_entries = summary.as_ref().map_or(0, |(_, n)| *n);
        let mut messages = vec![system];
        if let Some((message, _)) = summary {
            messages.push(message);
        }
        messages.extend(recent);
        messages.push(user);

        let window = self.finish(messages, naive.len(), original_chars, summarized_entries);
        debug!(
            "Context trimmed from {} to {} chars ({} messages dropped)",
            window.stats.original_chars, window.stats.final_chars, window.stats.dropped_messages
        );
        window
    }

    fn finish(
        &self,
        messages: Vec<Message>,
        naive_len: usize,
        original_chars: usize,
        summarized_entries: usize,
    ) -> ContextWindow {
        let dropped_messages = naive_len.saturating_sub(messages.len());
        let final_chars = total_chars(&messages);
        ContextWindow {
            stats: ContextStats {
                original_chars,
                final_chars,
                dropped_messages,
                trimmed: dropped_messages > 0 || final_chars != original_chars,
                summarized_entries,
            },
            messages,
        }
    }
}

//! Conversation log: one entry per completed translation turn.
//!
//! An entry is recorded only when a turn produced both a source
//! transcript and a translation. Turns that were interrupted or yielded
//! audio without any transcript leave no trace here.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entries kept before the oldest is evicted.
const MAX_ENTRIES: usize = 200;

/// One completed translation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Label of the detected or configured source language.
    pub source_label: String,
    /// What the speaker said, in the source language.
    pub source_text: String,
    /// The spoken translation, in the target language.
    pub translated_text: String,
}

impl HistoryEntry {
    pub fn new(source_label: &str, source_text: &str, translated_text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_label: source_label.to_string(),
            source_text: source_text.to_string(),
            translated_text: translated_text.to_string(),
        }
    }
}

/// Shared most-recent-first log of completed turns, capped at
/// [`MAX_ENTRIES`] with the oldest evicted first. Cloned snapshots are
/// handed to the UI; the live pump records concurrently.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn. Returns `false` (and records nothing)
    /// unless both texts are non-empty after trimming.
    pub fn record_turn(
        &self,
        source_label: &str,
        source_text: &str,
        translated_text: &str,
    ) -> bool {
        let source_text = source_text.trim();
        let translated_text = translated_text.trim();
        if source_text.is_empty() || translated_text.is_empty() {
            return false;
        }
        let entry = HistoryEntry::new(source_label, source_text, translated_text);
        tracing::debug!(entry_id = %entry.id, "Recording conversation turn");
        let mut entries = self.entries.lock();
        if entries.len() == MAX_ENTRIES {
            entries.pop_back();
        }
        entries.push_front(entry);
        true
    }

    /// Snapshot of all entries, newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_turn_with_both_texts() {
        let log = ConversationLog::new();
        assert!(log.record_turn("English", "Hello", "Hola"));
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_text, "Hello");
        assert_eq!(entries[0].translated_text, "Hola");
        assert_eq!(entries[0].source_label, "English");
    }

    #[test]
    fn rejects_turn_missing_either_text() {
        let log = ConversationLog::new();
        assert!(!log.record_turn("English", "", "Hola"));
        assert!(!log.record_turn("English", "Hello", ""));
        assert!(!log.record_turn("English", "   ", "Hola"));
        assert!(log.is_empty());
    }

    #[test]
    fn trims_whitespace_on_record() {
        let log = ConversationLog::new();
        assert!(log.record_turn("Auto-detect", "  Hello ", " Hola\n"));
        let entries = log.entries();
        assert_eq!(entries[0].source_text, "Hello");
        assert_eq!(entries[0].translated_text, "Hola");
    }

    #[test]
    fn entries_are_most_recent_first() {
        let log = ConversationLog::new();
        log.record_turn("English", "first", "primero");
        log.record_turn("English", "second", "segundo");
        let entries = log.entries();
        assert_eq!(entries[0].source_text, "second");
        assert_eq!(entries[1].source_text, "first");
        assert!(entries[0].timestamp >= entries[1].timestamp);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = ConversationLog::new();
        log.record_turn("English", "Hello", "Hola");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn cap_evicts_oldest_entries() {
        let log = ConversationLog::new();
        for i in 0..(MAX_ENTRIES + 5) {
            log.record_turn("English", &format!("line {i}"), "x");
        }
        let entries = log.entries();
        assert_eq!(entries.len(), MAX_ENTRIES);
        // Newest at the front, oldest survivor at the back.
        assert_eq!(entries[0].source_text, format!("line {}", MAX_ENTRIES + 4));
        assert_eq!(entries.last().unwrap().source_text, "line 5");
    }

    #[test]
    fn entry_serializes_to_json() {
        let entry = HistoryEntry::new("French", "Bonjour", "Hello");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("Bonjour"));
        let parsed: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }
}

//! Transcript entry normalization and the bounded history list.

use std::collections::VecDeque;

use vocalis_core::types::TranscriptEntry;

/// Resolve `final_text` and `raw_text` against `text` and republish `text`.
///
/// Blank optional fields fall back to the original text, so consumers reading
/// either the legacy `text` field or the enriched fields see the same content.
pub fn normalize_entry(mut entry: TranscriptEntry) -> TranscriptEntry {
    let original = entry.text.clone();
    let final_text = non_blank(entry.final_text.take()).unwrap_or_else(|| original.clone());
    let raw_text = non_blank(entry.raw_text.take()).unwrap_or(original);

    entry.text = final_text.clone();
    entry.final_text = Some(final_text);
    entry.raw_text = Some(raw_text);
    entry
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Transcript history, newest first, never longer than its bound.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<TranscriptEntry>,
    max_entries: usize,
}

impl History {
    /// A bound of zero keeps nothing.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    /// Insert at the front, dropping the oldest entries past the bound.
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.max_entries);
    }

    /// Change the bound, trimming immediately if it shrank.
    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        self.entries.truncate(self.max_entries);
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&TranscriptEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }
}

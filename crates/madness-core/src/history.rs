//! Append-only history of admitted events.
//!
//! The history log is independent of rounds and feeds the period-scoped
//! leaderboards. Nothing in the core removes entries.

use chrono::{DateTime, Utc};

use madness_types::{HistoryEntry, Period};

/// Append-only log of [`HistoryEntry`] values in admission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a log from persisted entries, ordered by timestamp.
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|entry| entry.timestamp);
        Self { entries }
    }

    /// Append an entry.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// All entries in admission order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose age at `now` is within the period's cutoff. Entries
    /// stamped after `now` are included.
    pub fn filter_by_period(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &HistoryEntry> {
        let cutoff = period.cutoff();
        self.entries.iter().filter(move |entry| {
            cutoff.is_none_or(|max_age| now.signed_duration_since(entry.timestamp) <= max_age)
        })
    }
}

//! Time-windowed event deduplication.
//!
//! Several clan members run the same RuneLite plugin, so every clan chat
//! loot line arrives once per online member. The [`Deduplicator`] admits
//! the first copy and rejects the rest for one window.
//!
//! The key map is a TTL cache: [`Deduplicator::sweep`] evicts keys past
//! the retention period. It is called from a periodic task that takes the
//! same engine lock as admission.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

/// Admits or rejects event keys within a time window.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    window: TimeDelta,
    retention: TimeDelta,
    seen: HashMap<String, DateTime<Utc>>,
}

impl Deduplicator {
    /// Create a deduplicator. `retention` is raised to `window` if shorter,
    /// since evicting a key inside its window would re-admit a duplicate.
    pub fn new(window: TimeDelta, retention: TimeDelta) -> Self {
        Self {
            window,
            retention: retention.max(window),
            seen: HashMap::new(),
        }
    }

    /// The dedup window.
    pub const fn window(&self) -> TimeDelta {
        self.window
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Admit `key` at `now`.
    ///
    /// Returns `true` (and stamps the key) if it is new or its last
    /// admission is at least one window old. Returns `false` otherwise
    /// and changes nothing. A last admission in the future (clock moved
    /// backwards) counts as inside the window.
    pub fn admit(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.seen.get(key)
            && now.signed_duration_since(*last) < self.window
        {
            return false;
        }
        self.seen.insert(key.to_owned(), now);
        true
    }

    /// Evict keys older than the retention period. Returns how many were
    /// removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        let retention = self.retention;
        self.seen
            .retain(|_, last| now.signed_duration_since(*last) <= retention);
        before.saturating_sub(self.seen.len())
    }
}

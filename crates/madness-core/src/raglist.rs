//! The raglist: flagged hunt targets whose deaths trigger an alert.

use std::collections::BTreeSet;

use madness_types::PlayerName;

/// Set of flagged target names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Raglist {
    targets: BTreeSet<PlayerName>,
}

impl Raglist {
    /// Create an empty raglist.
    pub const fn new() -> Self {
        Self {
            targets: BTreeSet::new(),
        }
    }

    /// Rebuild a raglist from persisted names.
    pub fn from_targets(targets: impl IntoIterator<Item = PlayerName>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    /// Flag a target. Returns `true` if newly added.
    pub fn add(&mut self, target: PlayerName) -> bool {
        self.targets.insert(target)
    }

    /// Unflag a target. Returns `true` if it was flagged.
    pub fn remove(&mut self, target: &PlayerName) -> bool {
        self.targets.remove(target)
    }

    /// Whether `target` is flagged.
    pub fn contains(&self, target: &PlayerName) -> bool {
        self.targets.contains(target)
    }

    /// Flagged targets in name order.
    pub fn targets(&self) -> impl Iterator<Item = &PlayerName> {
        self.targets.iter()
    }
}

//! Persisted state documents.
//!
//! A [`Snapshot`] is the full durable state of the engine. Storage writes
//! it as four JSON documents:
//!
//! | File              | Content                                              |
//! |-------------------|------------------------------------------------------|
//! | `registered.json` | clan roster, sorted array of names                   |
//! | `raglist.json`    | raglist, sorted array of names                       |
//! | `bounties.json`   | target -> `{once, persistent}` pools                 |
//! | `state.json`      | `{currentEvent, clanOnlyMode, events, killLog, lootLog}` |
//!
//! Finished rounds are written separately as a [`RoundArchive`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use madness_ledger::BountyRecord;
use madness_types::{DEFAULT_ROUND, HistoryEntry, PlayerName};

use crate::rounds::EventRound;

/// Full durable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Clan roster members.
    #[serde(default)]
    pub registered: Vec<PlayerName>,
    /// Raglisted targets.
    #[serde(default)]
    pub raglist: Vec<PlayerName>,
    /// Bounty records keyed by target.
    #[serde(default)]
    pub bounties: BTreeMap<PlayerName, BountyRecord>,
    /// Rounds, mode flags and the history log.
    #[serde(default)]
    pub state: StateDocument,
}

/// The `state.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    /// Name of the current round.
    #[serde(default = "default_current_event")]
    pub current_event: String,
    /// Whether clan-only mode is on.
    #[serde(default)]
    pub clan_only_mode: bool,
    /// Live rounds keyed by name.
    #[serde(default)]
    pub events: BTreeMap<String, EventRound>,
    /// History entries for plain kills.
    #[serde(default)]
    pub kill_log: Vec<HistoryEntry>,
    /// History entries for loot drops.
    #[serde(default)]
    pub loot_log: Vec<HistoryEntry>,
}

fn default_current_event() -> String {
    DEFAULT_ROUND.to_owned()
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            current_event: default_current_event(),
            clan_only_mode: false,
            events: BTreeMap::new(),
            kill_log: Vec::new(),
            loot_log: Vec::new(),
        }
    }
}

impl StateDocument {
    /// Split a history log into the kill and loot documents.
    pub fn split_history<'a>(
        entries: impl IntoIterator<Item = &'a HistoryEntry>,
    ) -> (Vec<HistoryEntry>, Vec<HistoryEntry>) {
        entries
            .into_iter()
            .cloned()
            .partition(|entry| entry.gp.is_none())
    }

    /// Merge the kill and loot documents back into one log.
    pub fn merged_history(&self) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .kill_log
            .iter()
            .chain(self.loot_log.iter())
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }
}

/// A finished round, handed to storage once and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundArchive {
    /// Round name.
    pub name: String,
    /// When the round was finished.
    pub finished_at: DateTime<Utc>,
    /// Storage reference, also the archive file stem.
    pub snapshot_ref: String,
    /// Final counters.
    pub round: EventRound,
}

impl RoundArchive {
    /// Wrap a finished round, deriving its reference from the name and
    /// finish time.
    pub fn new(round: EventRound, finished_at: DateTime<Utc>) -> Self {
        let snapshot_ref = snapshot_ref(&round.name, finished_at);
        Self {
            name: round.name.clone(),
            finished_at,
            snapshot_ref,
            round,
        }
    }
}

/// Hands out archive references that are unique for the life of the
/// engine.
///
/// Two rounds of the same name finished in the same millisecond would
/// share a [`snapshot_ref`]; repeats get `-2`, `-3`, ... appended.
#[derive(Debug, Default)]
pub struct ArchiveRefs {
    issued: HashSet<String>,
}

impl ArchiveRefs {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive a finished round under a reference not handed out before.
    pub fn archive(&mut self, round: EventRound, finished_at: DateTime<Utc>) -> RoundArchive {
        let mut archive = RoundArchive::new(round, finished_at);
        let base = archive.snapshot_ref.clone();
        let mut repeat: u32 = 1;
        while self.issued.contains(&archive.snapshot_ref) {
            repeat = repeat.saturating_add(1);
            archive.snapshot_ref = format!("{base}-{repeat}");
        }
        self.issued.insert(archive.snapshot_ref.clone());
        archive
    }
}

/// `<name>-<YYYYmmddTHHMMSSmmmZ>`, with characters unsafe in file names
/// replaced by `_`.
pub fn snapshot_ref(name: &str, finished_at: DateTime<Utc>) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}-{}", finished_at.format("%Y%m%dT%H%M%S%3fZ"))
}

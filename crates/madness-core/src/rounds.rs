//! Event rounds and their lifecycle.
//!
//! A round is a named scoring period with its own counters. Exactly one
//! round is current; every admitted event mutates the current round only.
//! The `"default"` round always exists. Finishing a named round removes it
//! from the store (the caller hands it to persistence first) and makes
//! `"default"` current again; finishing `"default"` resets it in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use madness_types::{DEFAULT_ROUND, PlayerName};

/// Errors from round lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    /// The name is blank, reserved, or already taken.
    #[error("event name {name:?} is empty, reserved, or already exists")]
    DuplicateOrInvalidName {
        /// The rejected name, as given.
        name: String,
    },
}

/// Per-round counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRound {
    /// Round name.
    pub name: String,
    /// Kills per killer (plain kills and loot-producing kills).
    #[serde(rename = "kills", default)]
    pub kill_counts: BTreeMap<PlayerName, u64>,
    /// Deaths per victim.
    #[serde(rename = "deaths", default)]
    pub death_counts: BTreeMap<PlayerName, u64>,
    /// Loot value per killer.
    #[serde(rename = "loot", default)]
    pub loot_totals: BTreeMap<PlayerName, u64>,
    /// GP earned per killer.
    #[serde(rename = "gp", default)]
    pub gp_total: BTreeMap<PlayerName, u64>,
}

impl EventRound {
    /// Create an empty round.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Record a plain kill. Returns the victim's death count afterwards.
    pub fn record_kill(&mut self, killer: &PlayerName, victim: &PlayerName) -> u64 {
        bump(&mut self.kill_counts, killer, 1);
        bump(&mut self.death_counts, victim, 1)
    }

    /// Record a loot drop. Returns the killer's loot total afterwards.
    pub fn record_loot(&mut self, killer: &PlayerName, gp: u64) -> u64 {
        bump(&mut self.kill_counts, killer, 1);
        bump(&mut self.gp_total, killer, gp);
        bump(&mut self.loot_totals, killer, gp)
    }

    /// Sum of GP earned by everyone in this round.
    pub fn total_gp(&self) -> u64 {
        self.gp_total
            .values()
            .fold(0_u64, |acc, gp| acc.saturating_add(*gp))
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.kill_counts.is_empty()
            && self.death_counts.is_empty()
            && self.loot_totals.is_empty()
            && self.gp_total.is_empty()
    }
}

/// Saturating increment of a per-player counter. Returns the new value.
fn bump(counts: &mut BTreeMap<PlayerName, u64>, player: &PlayerName, by: u64) -> u64 {
    let slot = counts.entry(player.clone()).or_insert(0);
    *slot = slot.saturating_add(by);
    *slot
}

/// Normalize a user-supplied round name.
pub fn normalize_round_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// All live rounds plus the current-round pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStore {
    rounds: BTreeMap<String, EventRound>,
    current: String,
}

impl Default for RoundStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundStore {
    /// A store holding only an empty `"default"` round, which is current.
    pub fn new() -> Self {
        let mut rounds = BTreeMap::new();
        rounds.insert(DEFAULT_ROUND.to_owned(), EventRound::new(DEFAULT_ROUND));
        Self {
            rounds,
            current: DEFAULT_ROUND.to_owned(),
        }
    }

    /// Rebuild a store from persisted rounds.
    ///
    /// Map keys win over the names stored inside the rounds. A missing
    /// `"default"` round is recreated; an unknown current round falls back
    /// to `"default"`.
    pub fn from_parts(rounds: BTreeMap<String, EventRound>, current: &str) -> Self {
        let mut rounds: BTreeMap<String, EventRound> = rounds
            .into_iter()
            .map(|(name, mut round)| {
                let name = normalize_round_name(&name);
                round.name.clone_from(&name);
                (name, round)
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();
        rounds
            .entry(DEFAULT_ROUND.to_owned())
            .or_insert_with(|| EventRound::new(DEFAULT_ROUND));

        let current = normalize_round_name(current);
        let current = if rounds.contains_key(&current) {
            current
        } else {
            warn!(current, "saved current event does not exist, using default");
            DEFAULT_ROUND.to_owned()
        };

        Self { rounds, current }
    }

    /// Name of the current round.
    pub fn current_name(&self) -> &str {
        &self.current
    }

    /// The current round.
    pub fn current(&self) -> &EventRound {
        // The constructor and every transition keep `current` pointing at
        // a live round; the fallback only guards against that breaking.
        self.rounds
            .get(&self.current)
            .or_else(|| self.rounds.get(DEFAULT_ROUND))
            .unwrap_or(&EMPTY_ROUND)
    }

    fn current_mut(&mut self) -> &mut EventRound {
        let current = self.current.clone();
        self.rounds
            .entry(current)
            .or_insert_with_key(|name| EventRound::new(name.clone()))
    }

    /// A round by (normalized) name.
    pub fn get(&self, name: &str) -> Option<&EventRound> {
        self.rounds.get(&normalize_round_name(name))
    }

    /// All live rounds keyed by name.
    pub const fn rounds(&self) -> &BTreeMap<String, EventRound> {
        &self.rounds
    }

    /// Start a new round and make it current. Returns the normalized name.
    pub fn create(&mut self, name: &str) -> Result<String, RoundError> {
        let normalized = normalize_round_name(name);
        if normalized.is_empty()
            || normalized == DEFAULT_ROUND
            || self.rounds.contains_key(&normalized)
        {
            return Err(RoundError::DuplicateOrInvalidName {
                name: name.to_owned(),
            });
        }

        self.rounds
            .insert(normalized.clone(), EventRound::new(normalized.clone()));
        self.current.clone_from(&normalized);
        Ok(normalized)
    }

    /// Finish the current round and return its final state.
    ///
    /// A named round is removed; `"default"` is replaced by an empty round.
    /// Either way `"default"` is current afterwards.
    pub fn finish(&mut self) -> EventRound {
        let name = core::mem::replace(&mut self.current, DEFAULT_ROUND.to_owned());
        let finished = if name == DEFAULT_ROUND {
            self.rounds
                .insert(DEFAULT_ROUND.to_owned(), EventRound::new(DEFAULT_ROUND))
        } else {
            self.rounds.remove(&name)
        };
        finished.unwrap_or_else(|| EventRound::new(name))
    }

    /// Record a plain kill in the current round. Returns the victim's
    /// death count in that round.
    pub fn record_kill(&mut self, killer: &PlayerName, victim: &PlayerName) -> u64 {
        self.current_mut().record_kill(killer, victim)
    }

    /// Record a loot drop in the current round. Returns the killer's loot
    /// total in that round.
    pub fn record_loot(&mut self, killer: &PlayerName, gp: u64) -> u64 {
        self.current_mut().record_loot(killer, gp)
    }
}

static EMPTY_ROUND: EventRound = EventRound {
    name: String::new(),
    kill_counts: BTreeMap::new(),
    death_counts: BTreeMap::new(),
    loot_totals: BTreeMap::new(),
    gp_total: BTreeMap::new(),
};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn name(raw: &str) -> PlayerName {
        PlayerName::from(raw)
    }

    fn count(map: &BTreeMap<PlayerName, u64>, player: &str) -> u64 {
        map.get(&name(player)).copied().unwrap_or(0)
    }

    #[test]
    fn new_store_has_default_current() {
        let store = RoundStore::new();
        assert_eq!(store.current_name(), DEFAULT_ROUND);
        assert_eq!(store.rounds().len(), 1);
        assert!(store.current().is_empty());
    }

    #[test]
    fn create_rejects_blank_reserved_and_duplicate() {
        let mut store = RoundStore::new();
        assert!(store.create("   ").is_err());
        assert!(store.create("Default").is_err());
        assert_eq!(store.create(" Comp1 ").unwrap(), "comp1");
        assert!(matches!(
            store.create("comp1"),
            Err(RoundError::DuplicateOrInvalidName { .. })
        ));
        assert_eq!(store.current_name(), "comp1");
    }

    #[test]
    fn kill_and_loot_share_kill_counter() {
        let mut round = EventRound::new("r");
        assert_eq!(round.record_kill(&name("foo"), &name("bar")), 1);
        assert_eq!(round.record_loot(&name("foo"), 500), 500);
        assert_eq!(round.record_loot(&name("foo"), 250), 750);

        assert_eq!(count(&round.kill_counts, "foo"), 3);
        assert_eq!(count(&round.death_counts, "bar"), 1);
        assert_eq!(count(&round.loot_totals, "foo"), 750);
        assert_eq!(count(&round.gp_total, "foo"), 750);
        assert_eq!(round.total_gp(), 750);
    }

    #[test]
    fn counters_saturate() {
        let mut round = EventRound::new("r");
        round.record_loot(&name("foo"), u64::MAX);
        assert_eq!(round.record_loot(&name("foo"), 10), u64::MAX);
    }

    #[test]
    fn rounds_are_isolated() {
        let mut store = RoundStore::new();
        store.record_loot(&name("foo"), 100);
        store.create("comp1").unwrap();
        store.record_loot(&name("foo"), 40);

        assert_eq!(count(&store.get("comp1").unwrap().loot_totals, "foo"), 40);
        assert_eq!(count(&store.get("default").unwrap().loot_totals, "foo"), 100);
    }

    #[test]
    fn finish_named_round_removes_it() {
        let mut store = RoundStore::new();
        store.create("comp1").unwrap();
        store.record_kill(&name("a"), &name("b"));

        let finished = store.finish();
        assert_eq!(finished.name, "comp1");
        assert_eq!(count(&finished.kill_counts, "a"), 1);
        assert_eq!(store.current_name(), DEFAULT_ROUND);
        assert!(store.get("comp1").is_none());
        assert!(store.current().is_empty());
    }

    #[test]
    fn finish_default_resets_it() {
        let mut store = RoundStore::new();
        store.record_kill(&name("a"), &name("b"));
        let finished = store.finish();
        assert_eq!(finished.name, DEFAULT_ROUND);
        assert!(!finished.is_empty());
        assert!(store.current().is_empty());
        assert!(store.get(DEFAULT_ROUND).is_some());
    }

    #[test]
    fn from_parts_repairs_missing_default_and_current() {
        let mut rounds = BTreeMap::new();
        rounds.insert("Comp1".to_owned(), EventRound::new("wrong"));
        let store = RoundStore::from_parts(rounds, "gone");
        assert_eq!(store.current_name(), DEFAULT_ROUND);
        assert!(store.get(DEFAULT_ROUND).is_some());
        assert_eq!(store.get("comp1").map(|r| r.name.as_str()), Some("comp1"));
    }
}

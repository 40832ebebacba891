//! Clan roster and clan-only eligibility.

use std::collections::BTreeSet;

use madness_types::PlayerName;

/// The set of registered clan members plus the clan-only toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClanRoster {
    members: BTreeSet<PlayerName>,
    clan_only: bool,
}

impl ClanRoster {
    /// Create an empty roster with clan-only mode set as given.
    pub const fn new(clan_only: bool) -> Self {
        Self {
            members: BTreeSet::new(),
            clan_only,
        }
    }

    /// Rebuild a roster from persisted members.
    pub fn from_members(members: impl IntoIterator<Item = PlayerName>, clan_only: bool) -> Self {
        Self {
            members: members.into_iter().collect(),
            clan_only,
        }
    }

    /// Add a member. Returns `true` if they were not already registered.
    pub fn add(&mut self, name: PlayerName) -> bool {
        self.members.insert(name)
    }

    /// Remove a member. Returns `true` if they were registered.
    pub fn remove(&mut self, name: &PlayerName) -> bool {
        self.members.remove(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &PlayerName) -> bool {
        self.members.contains(name)
    }

    /// Whether both participants are registered.
    pub fn both_members(&self, killer: &PlayerName, victim: &PlayerName) -> bool {
        self.contains(killer) && self.contains(victim)
    }

    /// Whether an event between these players may be recorded: always when
    /// clan-only mode is off, otherwise only if both are members.
    pub fn is_eligible(&self, killer: &PlayerName, victim: &PlayerName) -> bool {
        !self.clan_only || self.both_members(killer, victim)
    }

    /// Whether clan-only mode is on.
    pub const fn clan_only(&self) -> bool {
        self.clan_only
    }

    /// Set clan-only mode, returning the previous value.
    pub const fn set_clan_only(&mut self, enabled: bool) -> bool {
        let previous = self.clan_only;
        self.clan_only = enabled;
        previous
    }

    /// Registered members in name order.
    pub fn members(&self) -> impl Iterator<Item = &PlayerName> {
        self.members.iter()
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

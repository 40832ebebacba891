//! Core value structs: combat events, history entries and notifications.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::CombatKind;
use crate::names::{PlayerName, PosterId, normalize};

/// Name of the permanent baseline round.
pub const DEFAULT_ROUND: &str = "default";

// ---------------------------------------------------------------------------
// Combat events
// ---------------------------------------------------------------------------

/// A normalized kill or loot occurrence, as produced by the webhook
/// normalizer and consumed exactly once by the aggregation engine.
///
/// Names keep the casing they arrived with; the engine normalizes them
/// for keying and validates that neither is blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Kill or loot (with its GP).
    #[serde(flatten)]
    pub kind: CombatKind,
    /// The player credited with the kill, display casing.
    pub killer: String,
    /// The player who died, display casing.
    pub victim: String,
    /// Key used by the deduplicator.
    pub dedup_key: String,
    /// When the occurrence was observed.
    pub timestamp: DateTime<Utc>,
    /// The account whose plugin reported the occurrence, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
}

impl CombatEvent {
    /// Build a loot event keyed by the trimmed source chat line.
    pub fn loot(
        killer: impl Into<String>,
        victim: impl Into<String>,
        gp: u64,
        source_line: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: CombatKind::Loot { gp },
            killer: killer.into(),
            victim: victim.into(),
            dedup_key: loot_dedup_key(source_line),
            timestamp,
            reporter: None,
        }
    }

    /// Build a kill event keyed by killer and victim.
    pub fn kill(
        killer: impl Into<String>,
        victim: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let killer = killer.into();
        let victim = victim.into();
        let dedup_key = kill_dedup_key(&killer, &victim);
        Self {
            kind: CombatKind::Kill,
            killer,
            victim,
            dedup_key,
            timestamp,
            reporter: None,
        }
    }

    /// Attach the reporting account.
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = Some(reporter.into());
        self
    }
}

/// Dedup key of a loot line: the exact source text, trimmed.
pub fn loot_dedup_key(source_line: &str) -> String {
    source_line.trim().to_owned()
}

/// Dedup key of a kill: `K|<killer>|<victim>` on normalized names.
pub fn kill_dedup_key(killer: &str, victim: &str) -> String {
    format!("K|{}|{}", normalize(killer), normalize(victim))
}

// ---------------------------------------------------------------------------
// History log
// ---------------------------------------------------------------------------

/// One admitted occurrence in the append-only history log.
///
/// Independent of rounds: entries survive `FinishEvent` and feed the
/// period-scoped leaderboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Normalized killer.
    pub killer: PlayerName,
    /// Normalized victim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victim: Option<PlayerName>,
    /// Loot value, absent for plain kills.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gp: Option<u64>,
    /// When the occurrence was observed.
    pub timestamp: DateTime<Utc>,
    /// Whether both participants were on the clan roster at the time.
    pub is_clan: bool,
    /// The round that was current when the entry was appended.
    pub round_name: String,
}

// ---------------------------------------------------------------------------
// Outbound notifications
// ---------------------------------------------------------------------------

/// A human-facing notification produced by the engine for the notifier.
///
/// Names carry display casing where the engine has it (combat events)
/// and the normalized form otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A plain kill was recorded.
    KillLogged {
        /// Killer, display casing.
        killer: String,
        /// Victim, display casing.
        victim: String,
        /// The victim's death count in the current round.
        total_deaths: u64,
        /// Whether both participants are clan members.
        is_clan: bool,
    },
    /// A loot drop was recorded.
    LootDetected {
        /// Killer, display casing.
        killer: String,
        /// Victim, display casing.
        victim: String,
        /// Value of this drop.
        gp: u64,
        /// The killer's loot total in the current round.
        display_total: u64,
        /// Whether both participants are clan members.
        is_clan: bool,
    },
    /// A raglisted target was killed; `bounty_total` is the pre-payout sum
    /// of both pools.
    RaglistAlert {
        /// Victim, display casing.
        victim: String,
        /// Bounty about to be claimed.
        bounty_total: u64,
    },
    /// A bounty was paid out for a kill.
    BountyClaimed {
        /// Victim, display casing.
        victim: String,
        /// Killer, display casing.
        killer: String,
        /// Sum of both pools at the time of the kill.
        payout: u64,
        /// Everyone who contributed to either pool.
        poster_ids: BTreeSet<PosterId>,
    },
    /// A new event round was started.
    EventCreated {
        /// Round name.
        name: String,
    },
    /// The current event round was finished and archived.
    EventFinished {
        /// Round name.
        name: String,
        /// Reference to the archived round in storage.
        snapshot_ref: String,
    },
    /// Players were added to or removed from the clan roster.
    RosterChanged {
        /// Newly added normalized names.
        added: Vec<PlayerName>,
        /// Removed normalized names.
        removed: Vec<PlayerName>,
    },
}

impl Notification {
    /// Short label for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KillLogged { .. } => "kill_logged",
            Self::LootDetected { .. } => "loot_detected",
            Self::RaglistAlert { .. } => "raglist_alert",
            Self::BountyClaimed { .. } => "bounty_claimed",
            Self::EventCreated { .. } => "event_created",
            Self::EventFinished { .. } => "event_finished",
            Self::RosterChanged { .. } => "roster_changed",
        }
    }
}

//! Enumeration types shared across the bot.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Combat kind
// ---------------------------------------------------------------------------

/// What kind of occurrence a [`CombatEvent`](crate::CombatEvent) describes.
///
/// Loot always carries a GP amount and a plain kill never does, so the
/// amount lives inside the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CombatKind {
    /// A player kill without a loot drop.
    Kill,
    /// A player kill that produced a loot drop worth `gp` coins.
    Loot {
        /// Value of the drop in coins.
        gp: u64,
    },
}

impl CombatKind {
    /// The GP carried by this occurrence, if any.
    pub const fn gp(self) -> Option<u64> {
        match self {
            Self::Kill => None,
            Self::Loot { gp } => Some(gp),
        }
    }
}

// ---------------------------------------------------------------------------
// Admission status
// ---------------------------------------------------------------------------

/// Outcome of submitting a combat event to the aggregation engine.
///
/// Only [`Status::Ok`] means state was mutated. The other three are soft
/// outcomes reported back to the transport, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// The event was admitted and recorded.
    Ok,
    /// An identical event was admitted within the dedup window.
    Duplicate,
    /// Clan-only mode is on and a participant is not on the roster.
    IgnoredNonClan,
    /// Missing killer/victim or a zero GP loot.
    Invalid,
}

impl Status {
    /// Stable lowercase label used in logs and HTTP bodies.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Duplicate => "duplicate",
            Self::IgnoredNonClan => "ignored-non-clan",
            Self::Invalid => "invalid",
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Leaderboard periods
// ---------------------------------------------------------------------------

/// Time window for period-scoped leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// The last 24 hours.
    Daily,
    /// The last 7 days.
    Weekly,
    /// The last 30 days.
    Monthly,
    /// Everything in the history log.
    #[default]
    All,
}

impl Period {
    /// Maximum age of an entry included in this period, `None` for
    /// [`Period::All`].
    pub const fn cutoff(self) -> Option<TimeDelta> {
        match self {
            Self::Daily => Some(TimeDelta::hours(24)),
            Self::Weekly => Some(TimeDelta::days(7)),
            Self::Monthly => Some(TimeDelta::days(30)),
            Self::All => None,
        }
    }

    /// Parse a period keyword (`daily`, `weekly`, `monthly`, `all`),
    /// case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            "all" | "alltime" | "all-time" => Some(Self::All),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Bounty pools
// ---------------------------------------------------------------------------

/// Which bounty pool a contribution targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Paid out and cleared on the next kill.
    Once,
    /// Paid out on every kill and never cleared by a kill.
    Persistent,
}

//! Shared type definitions for the Monday Madness clan bot.
//!
//! This crate is the single source of truth for the values that flow
//! between the webhook receiver, the aggregation engine, the bounty
//! ledger, persistence and the notifier.
//!
//! # Modules
//!
//! - [`names`] -- Normalized player names and bounty poster identifiers
//! - [`enums`] -- Enumerations (combat kind, admission status, periods)
//! - [`structs`] -- Combat events, history entries, outbound notifications
//! - [`gp`] -- GP amount parsing (`5m`, `1.5k`, `12,000`) and formatting

pub mod enums;
pub mod gp;
pub mod names;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CombatKind, Period, PoolKind, Status};
pub use gp::{format_gp, parse_gp};
pub use names::{PlayerName, PosterId};
pub use structs::{
    CombatEvent, DEFAULT_ROUND, HistoryEntry, Notification, kill_dedup_key, loot_dedup_key,
};

//! Aggregation engine and state components for the Monday Madness clan bot.
//!
//! This crate turns normalized combat events into deduplicated, per-round
//! statistics, a clan-aware filter, and bounty payouts with alerting.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait, system clock and a manual test clock.
//! - [`config`] -- Configuration loading from `madness-config.yaml` into
//!   strongly-typed structs.
//! - [`dedup`] -- Time-windowed [`Deduplicator`] with TTL sweep.
//! - [`roster`] -- Clan roster and clan-only eligibility.
//! - [`raglist`] -- Flagged hunt targets.
//! - [`rounds`] -- Event rounds and their lifecycle.
//! - [`history`] -- Append-only history log for period leaderboards.
//! - [`leaderboard`] -- Hiscores and lootboard ranking.
//! - [`snapshot`] -- Persisted state documents.
//! - [`notifier`] -- [`Notifier`] trait plus log and recording notifiers.
//! - [`storage`] -- [`Storage`] trait plus in-memory storage.
//! - [`dispatch`] -- Background delivery of notifications and snapshots.
//! - [`engine`] -- The [`AggregationEngine`] orchestrator.
//!
//! [`Clock`]: clock::Clock
//! [`Deduplicator`]: dedup::Deduplicator
//! [`Notifier`]: notifier::Notifier
//! [`Storage`]: storage::Storage
//! [`AggregationEngine`]: engine::AggregationEngine

pub mod clock;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod history;
pub mod leaderboard;
pub mod notifier;
pub mod raglist;
pub mod roster;
pub mod rounds;
pub mod snapshot;
pub mod storage;

pub use engine::{AggregationEngine, EngineOptions, FinishedEvent, RoundInfo};
pub use error::CommandError;

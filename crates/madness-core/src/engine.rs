//! The aggregation engine.
//!
//! [`AggregationEngine`] owns every piece of mutable bot state behind one
//! async mutex: the dedup cache, the clan roster, the raglist, the event
//! rounds, the history log and the bounty ledger. Webhook handlers call
//! [`AggregationEngine::process`]; chat commands call the query and
//! lifecycle methods.
//!
//! # Admission pipeline
//!
//! ```text
//! validate -> eligibility -> dedup -> (auto-register reporter)
//!   -> record in current round -> history append -> KillLogged/LootDetected
//!   -> RaglistAlert (pre-payout total) -> bounty payout (BountyClaimed)
//!   -> mark dirty
//! ```
//!
//! Only the `ok` path mutates state. Notifications and dirty marks are
//! queued on the [`Outbox`] while the lock is held; background workers
//! deliver them and take the snapshot to persist.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use madness_ledger::{BountyLedger, BountyListing, Withdrawal};
use madness_types::{
    CombatEvent, CombatKind, HistoryEntry, Notification, Period, PlayerName, PoolKind, PosterId,
    Status,
};

use crate::clock::Clock;
use crate::config::BotConfig;
use crate::dedup::Deduplicator;
use crate::dispatch::{DispatchTimeouts, Outbox, SnapshotSource};
use crate::error::CommandError;
use crate::history::HistoryLog;
use crate::leaderboard::{Board, BoardFilter, LeaderboardRow, rank};
use crate::notifier::Notifier;
use crate::raglist::Raglist;
use crate::roster::ClanRoster;
use crate::rounds::{EventRound, RoundStore};
use crate::snapshot::{ArchiveRefs, Snapshot, StateDocument};
use crate::storage::Storage;

/// Tunables for an [`AggregationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Identical events inside this window collapse into one.
    pub dedup_window: TimeDelta,
    /// How long a dedup key is kept before the sweep evicts it.
    pub dedup_retention: TimeDelta,
    /// Initial clan-only mode, used until a snapshot is restored.
    pub clan_only_mode: bool,
    /// Add event reporters to the clan roster.
    pub auto_register_reporters: bool,
    /// Bounds on outbound calls.
    pub timeouts: DispatchTimeouts,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dedup_window: TimeDelta::seconds(10),
            dedup_retention: TimeDelta::seconds(20),
            clan_only_mode: false,
            auto_register_reporters: false,
            timeouts: DispatchTimeouts::default(),
        }
    }
}

impl EngineOptions {
    /// Derive options from the loaded configuration.
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            dedup_window: to_delta(config.dedup.window()),
            dedup_retention: to_delta(config.dedup.retention()),
            clan_only_mode: config.engine.clan_only_mode,
            auto_register_reporters: config.engine.auto_register_reporters,
            timeouts: DispatchTimeouts {
                notify: config.discord.timeout(),
                store: config.storage.timeout(),
            },
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// One row of [`AggregationEngine::list_events`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundInfo {
    /// Round name.
    pub name: String,
    /// Whether this is the current round.
    pub current: bool,
}

/// Result of [`AggregationEngine::finish_event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedEvent {
    /// Name of the finished round.
    pub name: String,
    /// Where storage archived it.
    pub snapshot_ref: String,
}

/// Everything the engine mutates, guarded by one lock.
#[derive(Debug)]
struct EngineState {
    dedup: Deduplicator,
    roster: ClanRoster,
    raglist: Raglist,
    rounds: RoundStore,
    history: HistoryLog,
    bounties: BountyLedger,
    archive_refs: ArchiveRefs,
}

impl EngineState {
    fn snapshot(&self) -> Snapshot {
        let (kill_log, loot_log) = StateDocument::split_history(self.history.entries());
        Snapshot {
            registered: self.roster.members().cloned().collect(),
            raglist: self.raglist.targets().cloned().collect(),
            bounties: self.bounties.records().clone(),
            state: StateDocument {
                current_event: self.rounds.current_name().to_owned(),
                clan_only_mode: self.roster.clan_only(),
                events: self.rounds.rounds().clone(),
                kill_log,
                loot_log,
            },
        }
    }
}

/// The engine state as seen by the storage worker.
struct SharedState(Arc<Mutex<EngineState>>);

impl SnapshotSource for SharedState {
    fn snapshot(&self) -> BoxFuture<'static, Snapshot> {
        let state = Arc::clone(&self.0);
        async move { state.lock().await.snapshot() }.boxed()
    }
}

/// Orchestrates admission, aggregation, bounties and rounds.
pub struct AggregationEngine {
    state: Arc<Mutex<EngineState>>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
    options: EngineOptions,
}

impl core::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AggregationEngine {
    /// Create an engine with empty state.
    ///
    /// Spawns the dispatch workers, so this must be called from inside a
    /// tokio runtime.
    pub fn new(
        options: EngineOptions,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let state = EngineState {
            dedup: Deduplicator::new(options.dedup_window, options.dedup_retention),
            roster: ClanRoster::new(options.clan_only_mode),
            raglist: Raglist::new(),
            rounds: RoundStore::new(),
            history: HistoryLog::new(),
            bounties: BountyLedger::new(),
            archive_refs: ArchiveRefs::new(),
        };
        let state = Arc::new(Mutex::new(state));
        let snapshots = Arc::new(SharedState(Arc::clone(&state)));
        Self {
            state,
            clock,
            outbox: Outbox::spawn(notifier, storage, snapshots, options.timeouts),
            options,
        }
    }

    /// Replace all durable state with a loaded snapshot. The dedup cache
    /// starts empty.
    pub async fn restore(&self, snapshot: Snapshot) {
        let Snapshot {
            registered,
            raglist,
            bounties,
            state: document,
        } = snapshot;

        let history = HistoryLog::from_entries(document.merged_history());
        let mut state = self.state.lock().await;
        state.roster = ClanRoster::from_members(registered, document.clan_only_mode);
        state.raglist = Raglist::from_targets(raglist);
        state.bounties = BountyLedger::from_records(bounties);
        state.rounds = RoundStore::from_parts(document.events, &document.current_event);
        state.history = history;
        state.dedup = Deduplicator::new(self.options.dedup_window, self.options.dedup_retention);

        info!(
            members = state.roster.len(),
            bounties = state.bounties.records().len(),
            rounds = state.rounds.rounds().len(),
            history = state.history.len(),
            current = state.rounds.current_name(),
            "engine state restored"
        );
    }

    /// The engine clock's current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Combat events
    // -----------------------------------------------------------------------

    /// Submit a normalized combat event.
    pub async fn process(&self, event: CombatEvent) -> Status {
        let (Some(killer), Some(victim)) = (
            PlayerName::parse(&event.killer),
            PlayerName::parse(&event.victim),
        ) else {
            debug!(killer = %event.killer, victim = %event.victim, "rejecting event with blank name");
            return Status::Invalid;
        };
        if event.kind.gp() == Some(0) || event.dedup_key.trim().is_empty() {
            debug!(%killer, %victim, kind = ?event.kind, "rejecting malformed event");
            return Status::Invalid;
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;

        if !state.roster.is_eligible(&killer, &victim) {
            debug!(%killer, %victim, status = %Status::IgnoredNonClan, "event ignored");
            return Status::IgnoredNonClan;
        }

        if !state.dedup.admit(&event.dedup_key, now) {
            debug!(%killer, %victim, key = %event.dedup_key, status = %Status::Duplicate, "event ignored");
            return Status::Duplicate;
        }

        // Only admitted events register their reporter.
        self.auto_register(&mut state, event.reporter.as_deref());

        let is_clan = state.roster.both_members(&killer, &victim);
        let round_name = state.rounds.current_name().to_owned();
        let killer_display = event.killer.trim().to_owned();
        let victim_display = event.victim.trim().to_owned();

        let notification = match event.kind {
            CombatKind::Kill => {
                let total_deaths = state.rounds.record_kill(&killer, &victim);
                Notification::KillLogged {
                    killer: killer_display.clone(),
                    victim: victim_display.clone(),
                    total_deaths,
                    is_clan,
                }
            }
            CombatKind::Loot { gp } => {
                let display_total = state.rounds.record_loot(&killer, gp);
                Notification::LootDetected {
                    killer: killer_display.clone(),
                    victim: victim_display.clone(),
                    gp,
                    display_total,
                    is_clan,
                }
            }
        };

        state.history.append(HistoryEntry {
            killer: killer.clone(),
            victim: Some(victim.clone()),
            gp: event.kind.gp(),
            timestamp: event.timestamp,
            is_clan,
            round_name,
        });
        info!(%killer, %victim, gp = ?event.kind.gp(), is_clan, "event recorded");
        self.outbox.notify(notification);

        if state.raglist.contains(&victim) {
            let bounty_total = state.bounties.total_for(&victim);
            info!(%victim, bounty_total, "raglisted target killed");
            self.outbox.notify(Notification::RaglistAlert {
                victim: victim_display.clone(),
                bounty_total,
            });
        }

        if let Some(payout) = state.bounties.on_target_killed(&victim) {
            info!(%victim, %killer, payout = payout.amount, "bounty claimed");
            self.outbox.notify(Notification::BountyClaimed {
                victim: victim_display,
                killer: killer_display,
                payout: payout.amount,
                poster_ids: payout.posters,
            });
        }

        self.outbox.save();
        Status::Ok
    }

    /// Submit a loot drop.
    pub async fn process_loot(
        &self,
        killer: &str,
        victim: &str,
        gp: u64,
        dedup_key: &str,
    ) -> Status {
        let event = CombatEvent {
            kind: CombatKind::Loot { gp },
            killer: killer.to_owned(),
            victim: victim.to_owned(),
            dedup_key: dedup_key.trim().to_owned(),
            timestamp: self.clock.now(),
            reporter: None,
        };
        self.process(event).await
    }

    /// Submit a plain kill.
    pub async fn process_kill(&self, killer: &str, victim: &str, dedup_key: &str) -> Status {
        let event = CombatEvent {
            kind: CombatKind::Kill,
            killer: killer.to_owned(),
            victim: victim.to_owned(),
            dedup_key: dedup_key.trim().to_owned(),
            timestamp: self.clock.now(),
            reporter: None,
        };
        self.process(event).await
    }

    fn auto_register(&self, state: &mut EngineState, reporter: Option<&str>) {
        if !self.options.auto_register_reporters {
            return;
        }
        let Some(reporter) = reporter.and_then(PlayerName::parse) else {
            return;
        };
        if state.roster.add(reporter.clone()) {
            info!(%reporter, "reporter auto-registered");
            self.outbox.notify(Notification::RosterChanged {
                added: vec![reporter],
                removed: Vec::new(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    /// Start a new round and make it current. Returns the normalized name.
    pub async fn create_event(&self, name: &str) -> Result<String, CommandError> {
        let mut state = self.state.lock().await;
        let name = state.rounds.create(name)?;
        info!(event = %name, "event created");
        self.outbox.notify(Notification::EventCreated { name: name.clone() });
        self.outbox.save();
        Ok(name)
    }

    /// Finish the current round: archive it, drop it (or reset
    /// `"default"`), and make `"default"` current.
    pub async fn finish_event(&self) -> FinishedEvent {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let round = state.rounds.finish();
        let archive = state.archive_refs.archive(round, now);
        let finished = FinishedEvent {
            name: archive.name.clone(),
            snapshot_ref: archive.snapshot_ref.clone(),
        };
        info!(event = %finished.name, snapshot_ref = %finished.snapshot_ref, "event finished");

        self.outbox.archive(archive);
        self.outbox.notify(Notification::EventFinished {
            name: finished.name.clone(),
            snapshot_ref: finished.snapshot_ref.clone(),
        });
        self.outbox.save();
        finished
    }

    /// All live rounds in name order.
    pub async fn list_events(&self) -> Vec<RoundInfo> {
        let state = self.state.lock().await;
        let current = state.rounds.current_name();
        state
            .rounds
            .rounds()
            .keys()
            .map(|name| RoundInfo {
                name: name.clone(),
                current: name == current,
            })
            .collect()
    }

    /// A copy of the current round.
    pub async fn current_round(&self) -> EventRound {
        self.state.lock().await.rounds.current().clone()
    }

    /// Name of the current round.
    pub async fn current_round_name(&self) -> String {
        self.state.lock().await.rounds.current_name().to_owned()
    }

    /// Sum of GP earned in the current round.
    pub async fn total_gp(&self) -> u64 {
        self.state.lock().await.rounds.current().total_gp()
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// Add players to the clan roster. Blank names are skipped. Returns
    /// the names that were newly added.
    pub async fn register<I, S>(&self, names: I) -> Vec<PlayerName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        let added: Vec<PlayerName> = names
            .into_iter()
            .filter_map(|raw| PlayerName::parse(raw.as_ref()))
            .filter(|name| state.roster.add(name.clone()))
            .collect();
        self.roster_changed(added.clone(), Vec::new());
        added
    }

    /// Remove players from the clan roster. Returns the names that were
    /// actually removed.
    pub async fn unregister<I, S>(&self, names: I) -> Vec<PlayerName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        let removed: Vec<PlayerName> = names
            .into_iter()
            .filter_map(|raw| PlayerName::parse(raw.as_ref()))
            .filter(|name| state.roster.remove(name))
            .collect();
        self.roster_changed(Vec::new(), removed.clone());
        removed
    }

    fn roster_changed(&self, added: Vec<PlayerName>, removed: Vec<PlayerName>) {
        if added.is_empty() && removed.is_empty() {
            return;
        }
        info!(added = added.len(), removed = removed.len(), "roster changed");
        self.outbox
            .notify(Notification::RosterChanged { added, removed });
        self.outbox.save();
    }

    /// Turn clan-only mode on or off. Returns the previous value.
    pub async fn set_clan_only(&self, enabled: bool) -> bool {
        let mut state = self.state.lock().await;
        let previous = state.roster.set_clan_only(enabled);
        if previous != enabled {
            info!(enabled, "clan-only mode changed");
            self.outbox.save();
        }
        previous
    }

    /// Whether clan-only mode is on.
    pub async fn clan_only(&self) -> bool {
        self.state.lock().await.roster.clan_only()
    }

    /// Registered clan members in name order.
    pub async fn roster(&self) -> Vec<PlayerName> {
        self.state.lock().await.roster.members().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Leaderboards
    // -----------------------------------------------------------------------

    /// Kills per player over `period`, optionally for one player.
    pub async fn hiscores(&self, period: Period, name: Option<&str>) -> Vec<LeaderboardRow> {
        self.board(Board::Hiscores, period, name).await
    }

    /// Loot GP per player over `period`, optionally for one player.
    pub async fn lootboard(&self, period: Period, name: Option<&str>) -> Vec<LeaderboardRow> {
        self.board(Board::Lootboard, period, name).await
    }

    async fn board(&self, board: Board, period: Period, name: Option<&str>) -> Vec<LeaderboardRow> {
        let now: DateTime<Utc> = self.clock.now();
        let player = name.and_then(PlayerName::parse);
        let state = self.state.lock().await;
        let filter = BoardFilter {
            clan_only: state.roster.clan_only(),
            player: player.as_ref(),
        };
        rank(board, state.history.filter_by_period(period, now), filter)
    }

    // -----------------------------------------------------------------------
    // Bounties
    // -----------------------------------------------------------------------

    /// Persistent and one-shot pools, each sorted by total descending.
    pub async fn bounty_list(&self) -> BountyListing {
        self.state.lock().await.bounties.list()
    }

    /// Pledge GP on a target. Returns the new total of that pool.
    pub async fn bounty_add(
        &self,
        kind: PoolKind,
        target: &str,
        amount: u64,
        poster: &PosterId,
    ) -> Result<u64, CommandError> {
        let target = parse_name(target)?;
        let mut state = self.state.lock().await;
        let total = state.bounties.add(kind, &target, amount, poster)?;
        info!(%target, %poster, amount, ?kind, total, "bounty added");
        self.outbox.save();
        Ok(total)
    }

    /// Withdraw GP from a target's pool, clamped to the poster's share.
    pub async fn bounty_remove(
        &self,
        kind: PoolKind,
        target: &str,
        amount: u64,
        poster: &PosterId,
    ) -> Result<Withdrawal, CommandError> {
        let target = parse_name(target)?;
        let mut state = self.state.lock().await;
        let withdrawal = state.bounties.remove(kind, &target, amount, poster)?;
        if withdrawal.withdrawn > 0 {
            info!(%target, %poster, withdrawn = withdrawal.withdrawn, ?kind, "bounty removed");
            self.outbox.save();
        }
        Ok(withdrawal)
    }

    // -----------------------------------------------------------------------
    // Raglist
    // -----------------------------------------------------------------------

    /// Raglisted targets in name order.
    pub async fn raglist(&self) -> Vec<PlayerName> {
        self.state.lock().await.raglist.targets().cloned().collect()
    }

    /// Flag targets. Returns the names that were newly added.
    pub async fn raglist_add<I, S>(&self, names: I) -> Vec<PlayerName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        let added: Vec<PlayerName> = names
            .into_iter()
            .filter_map(|raw| PlayerName::parse(raw.as_ref()))
            .filter(|name| state.raglist.add(name.clone()))
            .collect();
        if !added.is_empty() {
            info!(added = added.len(), "raglist updated");
            self.outbox.save();
        }
        added
    }

    /// Unflag targets. Returns the names that were actually removed.
    pub async fn raglist_remove<I, S>(&self, names: I) -> Vec<PlayerName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        let removed: Vec<PlayerName> = names
            .into_iter()
            .filter_map(|raw| PlayerName::parse(raw.as_ref()))
            .filter(|name| state.raglist.remove(name))
            .collect();
        if !removed.is_empty() {
            info!(removed = removed.len(), "raglist updated");
            self.outbox.save();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// A full snapshot of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    /// Evict stale dedup keys. Returns how many were removed.
    pub async fn sweep_dedup(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let evicted = state.dedup.sweep(now);
        if evicted > 0 {
            debug!(evicted, remaining = state.dedup.len(), "dedup cache swept");
        }
        evicted
    }

    /// Run [`sweep_dedup`](Self::sweep_dedup) every `interval` until the
    /// engine is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.sweep_dedup().await;
            }
        })
    }

    /// Wait until every queued notification and storage write has been
    /// handled.
    pub async fn flush(&self) {
        self.outbox.flush().await;
    }
}

fn parse_name(raw: &str) -> Result<PlayerName, CommandError> {
    PlayerName::parse(raw).ok_or_else(|| CommandError::InvalidName {
        name: raw.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use madness_ledger::LedgerError;
    use madness_types::DEFAULT_ROUND;

    use super::*;
    use crate::clock::ManualClock;
    use crate::notifier::RecordingNotifier;
    use crate::rounds::RoundError;
    use crate::storage::MemoryStorage;

    struct Harness {
        engine: AggregationEngine,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        storage: Arc<MemoryStorage>,
    }

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(1000)
    }

    fn harness_with(options: EngineOptions) -> Harness {
        let clock = Arc::new(ManualClock::new(start()));
        let notifier = Arc::new(RecordingNotifier::new());
        let storage = Arc::new(MemoryStorage::new());
        let engine =
            AggregationEngine::new(options, clock.clone(), notifier.clone(), storage.clone());
        Harness {
            engine,
            clock,
            notifier,
            storage,
        }
    }

    fn harness() -> Harness {
        harness_with(EngineOptions::default())
    }

    fn name(raw: &str) -> PlayerName {
        PlayerName::from(raw)
    }

    fn count(map: &std::collections::BTreeMap<PlayerName, u64>, player: &str) -> u64 {
        map.get(&name(player)).copied().unwrap_or(0)
    }

    #[tokio::test]
    async fn duplicate_loot_is_collapsed() {
        let h = harness();
        assert_eq!(h.engine.process_loot("Foo", "Bar", 1_000_000, "line1").await, Status::Ok);
        h.clock.advance(TimeDelta::seconds(5));
        assert_eq!(
            h.engine.process_loot("Foo", "Bar", 1_000_000, "line1").await,
            Status::Duplicate
        );

        let round = h.engine.current_round().await;
        assert_eq!(count(&round.loot_totals, "foo"), 1_000_000);
        assert_eq!(count(&round.kill_counts, "foo"), 1);

        h.engine.flush().await;
        assert_eq!(h.notifier.kinds(), vec!["loot_detected"]);
    }

    #[tokio::test]
    async fn dedup_window_expires() {
        let h = harness();
        assert_eq!(h.engine.process_kill("a", "b", "K|a|b").await, Status::Ok);
        h.clock.advance(TimeDelta::seconds(10));
        assert_eq!(h.engine.process_kill("a", "b", "K|a|b").await, Status::Ok);
        assert_eq!(count(&h.engine.current_round().await.death_counts, "b"), 2);
    }

    #[tokio::test]
    async fn non_clan_kill_is_ignored_in_clan_only_mode() {
        let h = harness();
        h.engine.register(["foo", "bar"]).await;
        assert!(!h.engine.set_clan_only(true).await);

        assert_eq!(
            h.engine.process_kill("Foo", "Baz", "K|foo|baz").await,
            Status::IgnoredNonClan
        );
        let round = h.engine.current_round().await;
        assert_eq!(count(&round.death_counts, "baz"), 0);
        assert!(round.is_empty());

        assert_eq!(h.engine.process_kill("Foo", "Bar", "K|foo|bar").await, Status::Ok);
        h.engine.flush().await;
        assert!(matches!(
            h.notifier.notifications().last(),
            Some(Notification::KillLogged {
                total_deaths: 1,
                is_clan: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn ignored_event_does_not_consume_dedup_key() {
        let h = harness();
        h.engine.set_clan_only(true).await;
        assert_eq!(
            h.engine.process_kill("foo", "bar", "K|foo|bar").await,
            Status::IgnoredNonClan
        );
        h.engine.register(["foo", "bar"]).await;
        assert_eq!(h.engine.process_kill("foo", "bar", "K|foo|bar").await, Status::Ok);
    }

    #[tokio::test]
    async fn invalid_events_are_rejected() {
        let h = harness();
        assert_eq!(h.engine.process_loot("  ", "Bar", 10, "l").await, Status::Invalid);
        assert_eq!(h.engine.process_loot("Foo", "Bar", 0, "l").await, Status::Invalid);
        assert_eq!(h.engine.process_kill("Foo", "Bar", "   ").await, Status::Invalid);
        assert!(h.engine.current_round().await.is_empty());
    }

    #[tokio::test]
    async fn loot_aggregates_per_killer() {
        let h = harness();
        h.engine.process_loot("Foo", "Bar", 100, "l1").await;
        h.engine.process_loot("foo", "Baz", 250, "l2").await;
        h.engine.process_kill("FOO", "Bar", "K|foo|bar").await;

        let round = h.engine.current_round().await;
        assert_eq!(count(&round.loot_totals, "foo"), 350);
        assert_eq!(count(&round.gp_total, "foo"), 350);
        assert_eq!(count(&round.kill_counts, "foo"), 3);
        assert_eq!(count(&round.death_counts, "bar"), 1);
        assert_eq!(h.engine.total_gp().await, 350);

        h.engine.flush().await;
        let last_loot = h
            .notifier
            .notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::LootDetected { display_total, .. } => Some(display_total),
                _ => None,
            })
            .last();
        assert_eq!(last_loot, Some(350));
    }

    #[tokio::test]
    async fn bounty_paid_on_kill() {
        let h = harness();
        h.engine
            .bounty_add(PoolKind::Once, "evilguy", 5_000_000, &PosterId::from("u1"))
            .await
            .unwrap();
        h.engine
            .bounty_add(PoolKind::Persistent, "evilguy", 2_000_000, &PosterId::from("u2"))
            .await
            .unwrap();

        assert_eq!(h.engine.process_kill("Killer", "EvilGuy", "K|killer|evilguy").await, Status::Ok);
        h.engine.flush().await;

        let claimed = h
            .notifier
            .notifications()
            .into_iter()
            .find(|n| matches!(n, Notification::BountyClaimed { .. }))
            .unwrap();
        assert_eq!(
            claimed,
            Notification::BountyClaimed {
                victim: "EvilGuy".to_owned(),
                killer: "Killer".to_owned(),
                payout: 7_000_000,
                poster_ids: BTreeSet::from([PosterId::from("u1"), PosterId::from("u2")]),
            }
        );

        let listing = h.engine.bounty_list().await;
        assert!(listing.once.is_empty());
        assert_eq!(listing.persistent.len(), 1);
        assert_eq!(listing.persistent[0].pool.total(), 2_000_000);
    }

    #[tokio::test]
    async fn raglist_alert_precedes_payout() {
        let h = harness();
        h.engine.raglist_add(["EvilGuy"]).await;
        h.engine
            .bounty_add(PoolKind::Once, "evilguy", 300, &PosterId::from("u1"))
            .await
            .unwrap();

        h.engine.process_loot("Foo", "EvilGuy", 50, "line").await;
        h.engine.flush().await;

        assert_eq!(
            h.notifier.kinds(),
            vec!["loot_detected", "raglist_alert", "bounty_claimed"]
        );
        let alert = h.notifier.notifications()[1].clone();
        assert_eq!(
            alert,
            Notification::RaglistAlert {
                victim: "EvilGuy".to_owned(),
                bounty_total: 300,
            }
        );
        assert!(h.engine.bounty_list().await.once.is_empty());
    }

    #[tokio::test]
    async fn rounds_are_isolated_and_archived() {
        let h = harness();
        h.engine.process_loot("Foo", "Bar", 10, "before").await;
        assert_eq!(h.engine.create_event(" Comp1 ").await.unwrap(), "comp1");
        h.engine.process_loot("Foo", "Bar", 500, "during").await;

        let comp1 = h.engine.current_round().await;
        assert_eq!(comp1.name, "comp1");
        assert_eq!(count(&comp1.loot_totals, "foo"), 500);

        let finished = h.engine.finish_event().await;
        assert_eq!(finished.name, "comp1");
        assert!(finished.snapshot_ref.starts_with("comp1-"));

        let current = h.engine.current_round().await;
        assert_eq!(current.name, DEFAULT_ROUND);
        assert_eq!(count(&current.loot_totals, "foo"), 10);
        assert_eq!(
            h.engine.list_events().await,
            vec![RoundInfo {
                name: DEFAULT_ROUND.to_owned(),
                current: true,
            }]
        );

        h.engine.flush().await;
        let archives = h.storage.archives();
        assert_eq!(archives.len(), 1);
        assert_eq!(count(&archives[0].round.loot_totals, "foo"), 500);
        assert!(h.notifier.kinds().contains(&"event_finished"));
    }

    #[tokio::test]
    async fn create_event_conflicts_are_errors() {
        let h = harness();
        h.engine.create_event("comp1").await.unwrap();
        assert!(matches!(
            h.engine.create_event("COMP1").await,
            Err(CommandError::Round(RoundError::DuplicateOrInvalidName { .. }))
        ));
        assert!(h.engine.create_event("default").await.is_err());
        assert!(h.engine.create_event("").await.is_err());
    }

    #[tokio::test]
    async fn history_survives_finish_and_feeds_leaderboards() {
        let h = harness();
        h.engine.create_event("comp1").await.unwrap();
        h.engine.process_loot("Alice", "Bob", 900, "l1").await;
        h.engine.finish_event().await;
        h.clock.advance(TimeDelta::days(2));
        h.engine.process_kill("Carol", "Bob", "K|carol|bob").await;
        h.engine.process_loot("Carol", "Bob", 100, "l2").await;

        let all = h.engine.lootboard(Period::All, None).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].player, name("alice"));
        assert_eq!(all[0].value, 900);

        let daily = h.engine.hiscores(Period::Daily, None).await;
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].player, name("carol"));
        assert_eq!(daily[0].value, 2);

        let one = h.engine.hiscores(Period::All, Some("ALICE")).await;
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn roster_changes_notify_once() {
        let h = harness();
        let added = h.engine.register(["Foo", " ", "foo", "Bar"]).await;
        assert_eq!(added, vec![name("foo"), name("bar")]);
        assert!(h.engine.register(["FOO"]).await.is_empty());
        let removed = h.engine.unregister(["bar", "nobody"]).await;
        assert_eq!(removed, vec![name("bar")]);
        h.engine.flush().await;
        assert_eq!(h.notifier.kinds(), vec!["roster_changed", "roster_changed"]);
        assert_eq!(h.engine.roster().await, vec![name("foo")]);
    }

    #[tokio::test]
    async fn reporters_auto_register_only_when_enabled() {
        let event = || CombatEvent::kill("a", "b", start()).with_reporter("Scout");

        let off = harness();
        off.engine.process(event()).await;
        assert!(off.engine.roster().await.is_empty());

        let on = harness_with(EngineOptions {
            auto_register_reporters: true,
            ..EngineOptions::default()
        });
        on.engine.process(event()).await;
        assert_eq!(on.engine.roster().await, vec![name("scout")]);
    }

    #[tokio::test]
    async fn ignored_and_duplicate_events_do_not_register_reporters() {
        let h = harness_with(EngineOptions {
            auto_register_reporters: true,
            clan_only_mode: true,
            ..EngineOptions::default()
        });
        h.engine.register(["foo"]).await;

        let outsider = CombatEvent::kill("Foo", "Bar", start()).with_reporter("Bar");
        assert_eq!(h.engine.process(outsider).await, Status::IgnoredNonClan);
        assert_eq!(h.engine.roster().await, vec![name("foo")]);

        h.engine.register(["bar"]).await;
        let first = CombatEvent::kill("Foo", "Bar", start()).with_reporter("Scout");
        let repeat = CombatEvent::kill("Foo", "Bar", start()).with_reporter("Spotter");
        assert_eq!(h.engine.process(first).await, Status::Ok);
        assert_eq!(h.engine.process(repeat).await, Status::Duplicate);
        assert_eq!(
            h.engine.roster().await,
            vec![name("bar"), name("foo"), name("scout")]
        );
    }

    #[tokio::test]
    async fn bounty_command_errors() {
        let h = harness();
        let poster = PosterId::from("u1");
        assert!(matches!(
            h.engine.bounty_add(PoolKind::Once, "  ", 5, &poster).await,
            Err(CommandError::InvalidName { .. })
        ));
        assert_eq!(
            h.engine.bounty_add(PoolKind::Once, "x", 0, &poster).await,
            Err(CommandError::Ledger(LedgerError::ZeroAmount))
        );
        let withdrawal = h
            .engine
            .bounty_remove(PoolKind::Once, "x", 5, &poster)
            .await
            .unwrap();
        assert_eq!(withdrawal.withdrawn, 0);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_restore() {
        let h = harness();
        h.engine.register(["foo", "bar"]).await;
        h.engine.set_clan_only(true).await;
        h.engine.raglist_add(["evilguy"]).await;
        h.engine
            .bounty_add(PoolKind::Persistent, "evilguy", 42, &PosterId::from("u1"))
            .await
            .unwrap();
        h.engine.create_event("comp1").await.unwrap();
        h.engine.process_loot("foo", "bar", 77, "line").await;
        h.engine.process_kill("bar", "foo", "K|bar|foo").await;
        h.engine.flush().await;

        let saved = h.storage.latest().unwrap();
        assert_eq!(saved, h.engine.snapshot().await);
        assert_eq!(saved.state.kill_log.len(), 1);
        assert_eq!(saved.state.loot_log.len(), 1);

        let fresh = harness();
        fresh.engine.restore(saved.clone()).await;
        assert_eq!(fresh.engine.snapshot().await, saved);
        assert!(fresh.engine.clan_only().await);
        assert_eq!(fresh.engine.current_round().await.name, "comp1");
    }

    #[tokio::test]
    async fn burst_of_events_is_persisted_once() {
        let h = harness();
        for gp in 1..=20_u64 {
            let line = format!("line{gp}");
            assert_eq!(h.engine.process_loot("Foo", "Bar", gp, &line).await, Status::Ok);
        }
        h.engine.flush().await;

        assert!(h.storage.save_count() >= 1);
        assert!(h.storage.save_count() < 20);
        assert_eq!(h.storage.latest().unwrap(), h.engine.snapshot().await);
        assert_eq!(h.storage.latest().unwrap().state.loot_log.len(), 20);
    }

    #[tokio::test]
    async fn same_instant_finishes_get_distinct_refs() {
        let h = harness();
        h.engine.process_loot("Foo", "Bar", 10, "first").await;
        let first = h.engine.finish_event().await;
        h.engine.process_loot("Foo", "Bar", 20, "second").await;
        let second = h.engine.finish_event().await;

        assert_eq!(first.name, DEFAULT_ROUND);
        assert_eq!(second.name, DEFAULT_ROUND);
        assert_ne!(first.snapshot_ref, second.snapshot_ref);

        h.engine.flush().await;
        let archives = h.storage.archives();
        assert_eq!(archives.len(), 2);
        assert_eq!(archives[0].snapshot_ref, first.snapshot_ref);
        assert_eq!(count(&archives[0].round.loot_totals, "foo"), 10);
        assert_eq!(archives[1].snapshot_ref, second.snapshot_ref);
        assert_eq!(count(&archives[1].round.loot_totals, "foo"), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_are_serialized() {
        const EVENTS: u64 = 64;
        const DUPLICATES: usize = 8;

        let h = harness();
        let engine = Arc::new(h.engine);

        let mut tasks = Vec::new();
        for gp in 1..=EVENTS {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                let killer = format!("k{gp}");
                let line = format!("line{gp}");
                engine.process_loot(&killer, "victim", gp, &line).await
            }));
        }
        for _ in 0..DUPLICATES {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                engine.process_loot("Twin", "victim", 1_000, "shared line").await
            }));
        }

        let statuses: Vec<Status> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let ok = statuses.iter().filter(|s| **s == Status::Ok).count();
        let dup = statuses.iter().filter(|s| **s == Status::Duplicate).count();
        // Every distinct event plus exactly one of the twins.
        assert_eq!(ok, 65);
        assert_eq!(dup, 7);

        let round = engine.current_round().await;
        let distinct_gp: u64 = (1..=EVENTS).sum();
        assert_eq!(distinct_gp, 2_080);
        assert_eq!(round.total_gp(), 3_080);
        assert_eq!(round.gp_total.values().sum::<u64>(), 3_080);
        assert_eq!(round.kill_counts.values().sum::<u64>(), 65);
        assert_eq!(count(&round.kill_counts, "twin"), 1);

        engine.flush().await;
        assert_eq!(h.storage.latest().unwrap(), engine.snapshot().await);
    }

    #[tokio::test]
    async fn failing_collaborators_do_not_affect_status() {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = AggregationEngine::new(
            EngineOptions::default(),
            clock,
            Arc::new(RecordingNotifier::failing()),
            Arc::new(MemoryStorage::failing()),
        );
        assert_eq!(engine.process_loot("a", "b", 5, "l").await, Status::Ok);
        engine.flush().await;
        assert_eq!(engine.total_gp().await, 5);
    }

    #[tokio::test]
    async fn sweep_evicts_after_retention() {
        let h = harness();
        h.engine.process_kill("a", "b", "K|a|b").await;
        h.clock.advance(TimeDelta::seconds(5));
        assert_eq!(h.engine.sweep_dedup().await, 0);
        h.clock.advance(TimeDelta::seconds(30));
        assert_eq!(h.engine.sweep_dedup().await, 1);
    }
}

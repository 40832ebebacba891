//! The bounty ledger: one record of two pools per target.
//!
//! A [`BountyRecord`] holds a one-shot pool, which pays out and clears
//! on the next kill, and a persistent pool, which pays out on every kill
//! and is only ever reduced by explicit withdrawals.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use madness_types::{PlayerName, PoolKind, PosterId};

use crate::LedgerError;
use crate::pool::{BountyPool, Withdrawal};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Both bounty pools for a single target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyRecord {
    /// Pays out and clears on the next kill.
    #[serde(default)]
    pub once: BountyPool,
    /// Pays out on every kill without clearing.
    #[serde(default)]
    pub persistent: BountyPool,
}

impl BountyRecord {
    /// Combined total of both pools.
    pub const fn total(&self) -> u64 {
        self.once.total().saturating_add(self.persistent.total())
    }

    /// Whether both pools are empty (the record should not exist).
    pub const fn is_empty(&self) -> bool {
        self.once.is_empty() && self.persistent.is_empty()
    }

    const fn pool(&self, kind: PoolKind) -> &BountyPool {
        match kind {
            PoolKind::Once => &self.once,
            PoolKind::Persistent => &self.persistent,
        }
    }

    const fn pool_mut(&mut self, kind: PoolKind) -> &mut BountyPool {
        match kind {
            PoolKind::Once => &mut self.once,
            PoolKind::Persistent => &mut self.persistent,
        }
    }
}

/// A bounty paid out on a kill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Sum of both pools before the payout.
    pub amount: u64,
    /// Union of both pools' posters.
    pub posters: BTreeSet<PosterId>,
}

/// One line of a bounty listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BountyStanding {
    /// The target.
    pub target: PlayerName,
    /// The listed pool.
    pub pool: BountyPool,
}

/// All non-empty pools, split by kind, each sorted by total descending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BountyListing {
    /// Persistent pools.
    pub persistent: Vec<BountyStanding>,
    /// One-shot pools.
    pub once: Vec<BountyStanding>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Bounty records keyed by normalized target name.
#[derive(Debug, Clone, Default)]
pub struct BountyLedger {
    records: BTreeMap<PlayerName, BountyRecord>,
}

impl BountyLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Rebuild a ledger from persisted records, repairing pool totals and
    /// dropping records that hold nothing.
    pub fn from_records(records: BTreeMap<PlayerName, BountyRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|(target, record)| {
                let record = BountyRecord {
                    once: record.once.repaired(),
                    persistent: record.persistent.repaired(),
                };
                (target, record)
            })
            .filter(|(_, record)| !record.is_empty())
            .collect();
        Self { records }
    }

    /// All live records.
    pub const fn records(&self) -> &BTreeMap<PlayerName, BountyRecord> {
        &self.records
    }

    /// The record for a target, if any GP is on it.
    pub fn get(&self, target: &PlayerName) -> Option<&BountyRecord> {
        self.records.get(target)
    }

    /// Combined bounty on a target (0 if none).
    pub fn total_for(&self, target: &PlayerName) -> u64 {
        self.records.get(target).map_or(0, BountyRecord::total)
    }

    /// Pledge GP to the one-shot pool. Returns the new pool total.
    pub fn add_once(
        &mut self,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<u64, LedgerError> {
        self.add(PoolKind::Once, target, amount, poster)
    }

    /// Pledge GP to the persistent pool. Returns the new pool total.
    pub fn add_persistent(
        &mut self,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<u64, LedgerError> {
        self.add(PoolKind::Persistent, target, amount, poster)
    }

    /// Pledge GP to the given pool. Returns the new pool total.
    pub fn add(
        &mut self,
        kind: PoolKind,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let record = self.records.entry(target.clone()).or_default();
        let new_total = record.pool_mut(kind).deposit(poster, amount);

        let Some(new_total) = new_total else {
            if record.is_empty() {
                self.records.remove(target);
            }
            return Err(LedgerError::Overflow {
                target: target.clone(),
            });
        };

        debug!(%target, %poster, amount, ?kind, new_total, "bounty pledged");
        Ok(new_total)
    }

    /// Withdraw GP from the one-shot pool.
    pub fn remove_once(
        &mut self,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<Withdrawal, LedgerError> {
        self.remove(PoolKind::Once, target, amount, poster)
    }

    /// Withdraw GP from the persistent pool.
    pub fn remove_persistent(
        &mut self,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<Withdrawal, LedgerError> {
        self.remove(PoolKind::Persistent, target, amount, poster)
    }

    /// Withdraw up to `amount` of `poster`'s share from the given pool.
    ///
    /// Over-withdrawal is clamped to the poster's share and logged. The
    /// record is deleted once both pools are empty.
    pub fn remove(
        &mut self,
        kind: PoolKind,
        target: &PlayerName,
        amount: u64,
        poster: &PosterId,
    ) -> Result<Withdrawal, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let Some(record) = self.records.get_mut(target) else {
            warn!(%target, %poster, amount, ?kind, "withdrawal from target with no bounty");
            return Ok(Withdrawal {
                requested: amount,
                withdrawn: 0,
            });
        };

        let withdrawal = record.pool_mut(kind).withdraw(poster, amount);
        if withdrawal.was_clamped() {
            warn!(
                %target,
                %poster,
                requested = withdrawal.requested,
                withdrawn = withdrawal.withdrawn,
                ?kind,
                "bounty withdrawal clamped to poster's share"
            );
        }

        if record.is_empty() {
            self.records.remove(target);
        }

        Ok(withdrawal)
    }

    /// Settle the bounty on a killed target.
    ///
    /// The payout is computed from both pools before anything changes.
    /// The one-shot pool is cleared and the persistent pool is left as
    /// is. Returns `None` when there was nothing to pay.
    pub fn on_target_killed(&mut self, target: &PlayerName) -> Option<Payout> {
        let record = self.records.get_mut(target)?;
        let amount = record.total();
        if amount == 0 {
            self.records.remove(target);
            return None;
        }

        let mut posters = record.once.poster_ids();
        posters.extend(record.persistent.poster_ids());

        let cleared = record.once.clear();
        if record.persistent.is_empty() {
            self.records.remove(target);
        }

        debug!(%target, amount, once_cleared = cleared.total(), "bounty paid out");
        Some(Payout { amount, posters })
    }

    /// List all non-empty pools, persistent and one-shot, each sorted by
    /// total descending (ties by target name).
    pub fn list(&self) -> BountyListing {
        BountyListing {
            persistent: self.standings(PoolKind::Persistent),
            once: self.standings(PoolKind::Once),
        }
    }

    fn standings(&self, kind: PoolKind) -> Vec<BountyStanding> {
        let mut out: Vec<BountyStanding> = self
            .records
            .iter()
            .filter(|(_, record)| !record.pool(kind).is_empty())
            .map(|(target, record)| BountyStanding {
                target: target.clone(),
                pool: record.pool(kind).clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            b.pool
                .total()
                .cmp(&a.pool.total())
                .then_with(|| a.target.cmp(&b.target))
        });
        out
    }
}

//! A single bounty pool: a running total plus each poster's share.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use madness_types::PosterId;

/// Result of withdrawing GP from a pool.
///
/// Withdrawals are clamped to the poster's share, so `withdrawn` may be
/// less than `requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    /// Amount the caller asked to withdraw.
    pub requested: u64,
    /// Amount actually removed from the pool.
    pub withdrawn: u64,
}

impl Withdrawal {
    /// Whether the request exceeded the poster's share.
    pub const fn was_clamped(&self) -> bool {
        self.withdrawn < self.requested
    }
}

/// GP pledged on one target, split by poster.
///
/// `total` always equals the sum of `posters`. Fields are private so the
/// invariant can only be changed through [`deposit`](Self::deposit) and
/// [`withdraw`](Self::withdraw).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyPool {
    total: u64,
    posters: BTreeMap<PosterId, u64>,
}

impl BountyPool {
    /// Create an empty pool.
    pub const fn new() -> Self {
        Self {
            total: 0,
            posters: BTreeMap::new(),
        }
    }

    /// Total GP in the pool.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Whether the pool holds nothing.
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Per-poster shares.
    pub const fn posters(&self) -> &BTreeMap<PosterId, u64> {
        &self.posters
    }

    /// IDs of everyone with a share in the pool.
    pub fn poster_ids(&self) -> BTreeSet<PosterId> {
        self.posters.keys().cloned().collect()
    }

    /// Add `amount` from `poster`. Returns the new total, or `None` if
    /// either the total or the poster's share would overflow (in which
    /// case nothing changes).
    pub fn deposit(&mut self, poster: &PosterId, amount: u64) -> Option<u64> {
        let share = self.posters.get(poster).copied().unwrap_or(0);
        let new_share = share.checked_add(amount)?;
        let new_total = self.total.checked_add(amount)?;

        self.posters.insert(poster.clone(), new_share);
        self.total = new_total;
        Some(new_total)
    }

    /// Remove up to `amount` of `poster`'s share.
    ///
    /// The share and the total are both reduced by the same clamped
    /// amount, so the sum invariant holds even on over-withdrawal. A
    /// share that reaches zero is dropped.
    pub fn withdraw(&mut self, poster: &PosterId, amount: u64) -> Withdrawal {
        let share = self.posters.get(poster).copied().unwrap_or(0);
        let withdrawn = amount.min(share);
        let remaining = share.saturating_sub(withdrawn);

        if remaining == 0 {
            self.posters.remove(poster);
        } else {
            self.posters.insert(poster.clone(), remaining);
        }
        self.total = self.total.saturating_sub(withdrawn);

        Withdrawal {
            requested: amount,
            withdrawn,
        }
    }

    /// Empty the pool, returning what it held.
    pub fn clear(&mut self) -> Self {
        core::mem::take(self)
    }

    /// Rebuild the total from the shares and drop zero shares.
    ///
    /// Used when loading pools from disk, where the stored total cannot be
    /// trusted to match the shares.
    #[must_use]
    pub fn repaired(mut self) -> Self {
        self.posters.retain(|_, share| *share > 0);
        self.total = self
            .posters
            .values()
            .fold(0_u64, |acc, share| acc.saturating_add(*share));
        self
    }
}

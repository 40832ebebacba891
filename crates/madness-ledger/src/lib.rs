//! Bounty ledger for the Monday Madness clan bot.
//!
//! Clan members pledge GP on the heads of raglisted players. Every pledge
//! is tracked per poster so that contributions can be withdrawn and so
//! the payout notification can mention everyone who chipped in.
//!
//! # Architecture
//!
//! - [`pool`] -- The [`BountyPool`]: a total plus per-poster shares.
//! - [`ledger`] -- The [`BountyLedger`]: one [`BountyRecord`] (a one-shot
//!   and a persistent pool) per target, payout on kill, sorted listings.
//!
//! # Invariants
//!
//! - `pool.total() == sum(pool.posters())` after every operation.
//! - A poster entry exists only while its share is non-zero.
//! - A record exists only while `once.total() + persistent.total() > 0`.
//!
//! The ledger never panics; arithmetic is checked on the way up and
//! clamped at zero on the way down.
//!
//! # Usage
//!
//! ```
//! use madness_ledger::BountyLedger;
//! use madness_types::{PlayerName, PosterId};
//!
//! let mut ledger = BountyLedger::new();
//! let target = PlayerName::from("EvilGuy");
//!
//! ledger.add_once(&target, 5_000_000, &PosterId::from("u1")).ok();
//! ledger.add_persistent(&target, 2_000_000, &PosterId::from("u2")).ok();
//!
//! let payout = ledger.on_target_killed(&target);
//! assert_eq!(payout.map(|p| p.amount), Some(7_000_000));
//! assert_eq!(ledger.total_for(&target), 2_000_000);
//! ```

pub mod ledger;
pub mod pool;

// Re-export primary types at crate root.
pub use ledger::{BountyLedger, BountyListing, BountyRecord, BountyStanding, Payout};
pub use pool::{BountyPool, Withdrawal};

use madness_types::PlayerName;

/// Errors that can occur when recording bounty contributions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Contributions and withdrawals must be strictly positive.
    #[error("bounty amount must be greater than zero")]
    ZeroAmount,

    /// Adding the contribution would overflow the pool total.
    #[error("bounty on {target} would overflow")]
    Overflow {
        /// The target whose pool would overflow.
        target: PlayerName,
    },
}

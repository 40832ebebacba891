//! Error types returned by engine commands.

use madness_ledger::LedgerError;

use crate::rounds::RoundError;

/// Errors surfaced to the caller of an engine command.
///
/// Combat events never produce these; their soft outcomes are reported
/// as a [`Status`](madness_types::Status) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A round lifecycle conflict.
    #[error(transparent)]
    Round(#[from] RoundError),

    /// A rejected bounty operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A player name was empty after trimming.
    #[error("invalid player name {name:?}")]
    InvalidName {
        /// The rejected input.
        name: String,
    },
}

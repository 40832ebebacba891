//! File persistence for the Monday Madness clan bot.
//!
//! The bot keeps its durable state in a handful of JSON documents inside
//! one data directory:
//!
//! ```text
//! data/
//!   registered.json      clan roster
//!   raglist.json         flagged targets
//!   bounties.json        bounty pools per target
//!   state.json           rounds, clan-only flag, kill and loot history
//!   events/
//!     <name>-<YYYYmmddTHHMMSSZ>.json   finished rounds
//! ```
//!
//! [`JsonFileStore`] implements the engine's
//! [`Storage`](madness_core::storage::Storage) seam over that layout.

pub mod file_store;

pub use file_store::JsonFileStore;

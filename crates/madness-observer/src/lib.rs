//! HTTP surface of the Monday Madness clan bot.
//!
//! - **Webhook receiver** (`POST /dink`) for the Dink `RuneLite` plugin,
//!   plus a `POST /ping` liveness check
//! - **Command API** (`/api/...`) through which the chat command parser
//!   drives rounds, the roster, bounties, the raglist and leaderboards
//!
//! Incoming payloads are reduced to a [`RawChatEvent`] and normalized
//! into a canonical combat event before the engine sees them.

pub mod commands;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

pub use error::ObserverError;
pub use normalize::{RawChatEvent, parse_loot_line};
pub use router::build_router;
pub use server::{ServerError, listen_addr, start_server};
pub use startup::spawn_observer;
pub use state::AppState;

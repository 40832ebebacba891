//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::commands;
use crate::ingest;
use crate::state::AppState;

/// Build the complete router: the webhook receiver plus the command API
/// under `/api`. See [`ingest`] and [`commands`] for the route tables.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Webhook
        .route("/dink", post(ingest::dink))
        .route("/ping", post(ingest::ping))
        // Rounds
        .route(
            "/api/events",
            get(commands::list_events).post(commands::create_event),
        )
        .route("/api/events/finish", post(commands::finish_event))
        .route("/api/total-gp", get(commands::total_gp))
        // Roster
        .route("/api/roster", get(commands::roster))
        .route("/api/roster/register", post(commands::register))
        .route("/api/roster/unregister", post(commands::unregister))
        .route("/api/clan-only", put(commands::set_clan_only))
        // Leaderboards
        .route("/api/hiscores", get(commands::hiscores))
        .route("/api/lootboard", get(commands::lootboard))
        // Bounties
        .route(
            "/api/bounties",
            get(commands::list_bounties).post(commands::add_bounty),
        )
        .route("/api/bounties/remove", post(commands::remove_bounty))
        // Raglist
        .route(
            "/api/raglist",
            get(commands::raglist).post(commands::raglist_add),
        )
        .route("/api/raglist/remove", post(commands::raglist_remove))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

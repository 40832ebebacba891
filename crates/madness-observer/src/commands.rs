//! Command endpoints.
//!
//! The chat command parser talks to the engine through these routes. All
//! bodies are JSON; errors come back as `{"error", "status"}`.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/events` | List rounds, flagging the current one |
//! | `POST` | `/api/events` | Create and switch to a round |
//! | `POST` | `/api/events/finish` | Archive the current round |
//! | `GET` | `/api/roster` | Clan members and clan-only mode |
//! | `POST` | `/api/roster/register` | Add members |
//! | `POST` | `/api/roster/unregister` | Remove members |
//! | `PUT` | `/api/clan-only` | Toggle clan-only mode |
//! | `GET` | `/api/hiscores` | Kills leaderboard (`?period=&name=`) |
//! | `GET` | `/api/lootboard` | GP leaderboard (`?period=&name=`) |
//! | `GET` | `/api/total-gp` | GP earned in the current round |
//! | `GET` | `/api/bounties` | Open bounty pools |
//! | `POST` | `/api/bounties` | Pledge GP on a target |
//! | `POST` | `/api/bounties/remove` | Withdraw a pledge |
//! | `GET` | `/api/raglist` | Raglisted targets |
//! | `POST` | `/api/raglist` | Flag targets |
//! | `POST` | `/api/raglist/remove` | Unflag targets |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use madness_core::leaderboard::LeaderboardRow;
use madness_core::{FinishedEvent, RoundInfo};
use madness_ledger::BountyListing;
use madness_types::{Period, PlayerName, PoolKind, PosterId};

use crate::error::ObserverError;
use crate::normalize::GpField;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/events`.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Round name.
    pub name: String,
}

/// Body of the roster and raglist mutations.
#[derive(Debug, Deserialize)]
pub struct NamesRequest {
    /// Player names, any casing.
    pub names: Vec<String>,
}

/// Body of `PUT /api/clan-only`.
#[derive(Debug, Deserialize)]
pub struct ClanOnlyRequest {
    /// New mode.
    pub enabled: bool,
}

/// Query of the leaderboard endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    /// `daily`, `weekly`, `monthly` or `all` (default).
    pub period: Option<String>,
    /// Restrict to one player.
    pub name: Option<String>,
}

/// Body of the bounty mutations.
#[derive(Debug, Deserialize)]
pub struct BountyRequest {
    /// `once` or `persistent`.
    pub kind: PoolKind,
    /// Target player.
    pub target: String,
    /// Coins, as a number or a GP string such as `"5m"`.
    pub amount: GpField,
    /// Discord id of the poster.
    pub poster: String,
}

impl BountyRequest {
    fn parts(&self) -> Result<(u64, PosterId), ObserverError> {
        let amount = self.amount.coins().ok_or_else(|| {
            ObserverError::BadRequest(format!("amount {:?} is not a GP amount", self.amount))
        })?;
        let poster = self.poster.trim();
        if poster.is_empty() {
            return Err(ObserverError::BadRequest("poster is required".to_owned()));
        }
        Ok((amount, PosterId::new(poster)))
    }
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// `GET /api/events`
pub async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<RoundInfo>> {
    Json(state.engine.list_events().await)
}

/// `POST /api/events`
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Value>), ObserverError> {
    let name = state.engine.create_event(&body.name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "name": name }))))
}

/// `POST /api/events/finish`
pub async fn finish_event(State(state): State<Arc<AppState>>) -> Json<FinishedEvent> {
    Json(state.engine.finish_event().await)
}

/// `GET /api/total-gp`
pub async fn total_gp(State(state): State<Arc<AppState>>) -> Json<Value> {
    let event = state.engine.current_round_name().await;
    let gp = state.engine.total_gp().await;
    Json(json!({ "event": event, "gp": gp }))
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// `GET /api/roster`
pub async fn roster(State(state): State<Arc<AppState>>) -> Json<Value> {
    let members = state.engine.roster().await;
    let clan_only = state.engine.clan_only().await;
    Json(json!({ "clanOnly": clan_only, "members": members }))
}

/// `POST /api/roster/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NamesRequest>,
) -> Json<Value> {
    let added = state.engine.register(&body.names).await;
    Json(json!({ "added": added }))
}

/// `POST /api/roster/unregister`
pub async fn unregister(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NamesRequest>,
) -> Json<Value> {
    let removed = state.engine.unregister(&body.names).await;
    Json(json!({ "removed": removed }))
}

/// `PUT /api/clan-only`
pub async fn set_clan_only(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClanOnlyRequest>,
) -> Json<Value> {
    let previous = state.engine.set_clan_only(body.enabled).await;
    Json(json!({ "enabled": body.enabled, "previous": previous }))
}

// ---------------------------------------------------------------------------
// Leaderboards
// ---------------------------------------------------------------------------

fn parse_period(raw: Option<&str>) -> Result<Period, ObserverError> {
    raw.map_or(Ok(Period::All), |raw| {
        Period::parse(raw).ok_or_else(|| ObserverError::BadRequest(format!("unknown period {raw:?}")))
    })
}

/// `GET /api/hiscores`
pub async fn hiscores(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, ObserverError> {
    let period = parse_period(query.period.as_deref())?;
    Ok(Json(state.engine.hiscores(period, query.name.as_deref()).await))
}

/// `GET /api/lootboard`
pub async fn lootboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, ObserverError> {
    let period = parse_period(query.period.as_deref())?;
    Ok(Json(state.engine.lootboard(period, query.name.as_deref()).await))
}

// ---------------------------------------------------------------------------
// Bounties
// ---------------------------------------------------------------------------

/// `GET /api/bounties`
pub async fn list_bounties(State(state): State<Arc<AppState>>) -> Json<BountyListing> {
    Json(state.engine.bounty_list().await)
}

/// `POST /api/bounties`
pub async fn add_bounty(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BountyRequest>,
) -> Result<Json<Value>, ObserverError> {
    let (amount, poster) = body.parts()?;
    let total = state
        .engine
        .bounty_add(body.kind, &body.target, amount, &poster)
        .await?;
    Ok(Json(json!({
        "target": PlayerName::from(body.target.as_str()),
        "kind": body.kind,
        "total": total,
    })))
}

/// `POST /api/bounties/remove`
pub async fn remove_bounty(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BountyRequest>,
) -> Result<Json<Value>, ObserverError> {
    let (amount, poster) = body.parts()?;
    let withdrawal = state
        .engine
        .bounty_remove(body.kind, &body.target, amount, &poster)
        .await?;
    Ok(Json(json!({
        "requested": withdrawal.requested,
        "withdrawn": withdrawal.withdrawn,
        "clamped": withdrawal.was_clamped(),
    })))
}

// ---------------------------------------------------------------------------
// Raglist
// ---------------------------------------------------------------------------

/// `GET /api/raglist`
pub async fn raglist(State(state): State<Arc<AppState>>) -> Json<Vec<PlayerName>> {
    Json(state.engine.raglist().await)
}

/// `POST /api/raglist`
pub async fn raglist_add(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NamesRequest>,
) -> Json<Value> {
    let added = state.engine.raglist_add(&body.names).await;
    Json(json!({ "added": added }))
}

/// `POST /api/raglist/remove`
pub async fn raglist_remove(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NamesRequest>,
) -> Json<Value> {
    let removed = state.engine.raglist_remove(&body.names).await;
    Json(json!({ "removed": removed }))
}

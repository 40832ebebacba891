//! Webhook receiver.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/dink` | Dink webhook, JSON body or plain chat line |
//! | `POST` | `/ping` | Liveness check, answers `pong` |
//!
//! `/dink` accepts three content types:
//!
//! - `multipart/form-data` with the JSON in a `payload_json` part (what
//!   the Dink plugin sends)
//! - `application/json`
//! - `text/plain`, treated as one clan chat line
//!
//! Responses: `200 ok` when recorded, `200 dup` for a duplicate, `204` for
//! anything ignored, `400` for malformed input.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{debug, info};

use madness_types::Status;

use crate::error::ObserverError;
use crate::normalize::{Normalized, RawChatEvent, classify_payload};
use crate::state::AppState;

const PAYLOAD_FIELD: &str = "payload_json";

/// `POST /ping`
pub async fn ping() -> &'static str {
    "pong"
}

/// `POST /dink`
pub async fn dink(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ObserverError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let raw = if content_type.starts_with("multipart/form-data") {
        let payload = read_payload_field(request).await?;
        classify_payload(serde_json::from_str::<Value>(&payload)?)
    } else if content_type.starts_with("application/json") {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| ObserverError::BadRequest(e.body_text()))?;
        classify_payload(serde_json::from_slice::<Value>(&body)?)
    } else if content_type.starts_with("text/plain") {
        let line = String::from_request(request, &())
            .await
            .map_err(|e| ObserverError::BadRequest(e.body_text()))?;
        Some(RawChatEvent::ChatLine {
            line,
            reporter: None,
        })
    } else {
        return Err(ObserverError::BadRequest(format!("no {PAYLOAD_FIELD}")));
    };

    let Some(raw) = raw else {
        debug!("webhook payload is not a combat event");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let event = match raw.normalize(state.engine.now()) {
        Normalized::Event(event) => event,
        Normalized::NotCombat => return Ok(StatusCode::NO_CONTENT.into_response()),
        Normalized::Invalid(reason) => return Err(ObserverError::BadRequest(reason)),
    };

    let status = state.engine.process(event).await;
    info!(%status, "webhook processed");
    Ok(status_response(status))
}

fn status_response(status: Status) -> Response {
    match status {
        Status::Ok => (StatusCode::OK, "ok").into_response(),
        Status::Duplicate => (StatusCode::OK, "dup").into_response(),
        Status::IgnoredNonClan => StatusCode::NO_CONTENT.into_response(),
        Status::Invalid => (StatusCode::BAD_REQUEST, "invalid").into_response(),
    }
}

async fn read_payload_field(request: Request) -> Result<String, ObserverError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ObserverError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ObserverError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(PAYLOAD_FIELD) {
            return field
                .text()
                .await
                .map_err(|e| ObserverError::BadRequest(e.body_text()));
        }
    }
    Err(ObserverError::BadRequest(format!("no {PAYLOAD_FIELD}")))
}

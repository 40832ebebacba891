//! Error types for the HTTP layer.
//!
//! [`ObserverError`] converts into an Axum response with a JSON body of
//! the form `{"error": "...", "status": 400}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use madness_core::CommandError;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The request body or query was unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A command was rejected by the engine.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Command(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Serialization(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {e}")),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

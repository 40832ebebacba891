//! Runs the HTTP server on a background task so the binary can wait for
//! a shutdown signal alongside it.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use madness_core::config::ServerSection;

use crate::server::{ServerError, listen_addr, start_server};
use crate::state::AppState;

/// Spawn the server. The address is checked before spawning; bind and
/// serve errors come back through the join handle.
pub fn spawn_observer<F>(
    section: ServerSection,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<Result<(), ServerError>>, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listen_addr(&section)?;
    let handle = tokio::spawn(async move { start_server(&section, state, shutdown).await });
    tracing::debug!(%addr, "HTTP server task spawned");
    Ok(handle)
}

//! HTTP server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use madness_core::config::ServerSection;

use crate::router::build_router;
use crate::state::AppState;

/// Failure to bind or keep serving the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `host:port` is not a socket address.
    #[error("invalid listen address {addr:?}: {source}")]
    InvalidAddress {
        /// The rejected `host:port`.
        addr: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("serve error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Resolve the configured `host:port`.
pub fn listen_addr(section: &ServerSection) -> Result<SocketAddr, ServerError> {
    let addr = format!("{}:{}", section.host, section.port);
    addr.parse()
        .map_err(|source| ServerError::InvalidAddress { addr, source })
}

/// Serve the webhook and command API until `shutdown` resolves.
pub async fn start_server<F>(
    section: &ServerSection,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listen_addr(section)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "listening for webhooks and commands");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!("HTTP server stopped");
    Ok(())
}

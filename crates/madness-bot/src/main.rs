//! Monday Madness clan bot.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `madness-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the JSON file store and the Discord notifier
//! 4. Create the aggregation engine and restore persisted state
//! 5. Spawn the dedup sweeper
//! 6. Serve HTTP until Ctrl-C
//! 7. Flush queued notifications and snapshot writes

mod error;

use std::path::Path;
use std::sync::Arc;

use madness_core::clock::SystemClock;
use madness_core::config::{BotConfig, LogFormat, LoggingConfig};
use madness_core::storage::Storage;
use madness_core::{AggregationEngine, EngineOptions};
use madness_observer::AppState;
use madness_store::JsonFileStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::BotError;

const CONFIG_FILE: &str = "madness-config.yaml";

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // 1. Load configuration. Logging is not up yet, so remember whether
    //    defaults were used and report it afterwards.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("madness-bot starting");
    if from_file {
        info!(path = CONFIG_FILE, "configuration loaded");
    } else {
        info!(path = CONFIG_FILE, "config file not found, using defaults");
    }

    // 3. Collaborators.
    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir));
    let notifier = madness_notifier::build_notifier(&config.discord)?;
    info!(data_dir = %store.root().display(), "JSON file store ready");

    // 4. Engine.
    let options = EngineOptions::from_config(&config);
    let engine = Arc::new(AggregationEngine::new(
        options,
        Arc::new(SystemClock),
        notifier,
        Arc::clone(&store) as Arc<dyn Storage>,
    ));
    match store.load().await? {
        Some(snapshot) => engine.restore(snapshot).await,
        None => info!("no persisted state, starting fresh"),
    }

    // 5. Dedup sweeper.
    let sweeper = engine.spawn_sweeper(config.dedup.sweep_interval());

    // 6. HTTP server.
    let server = madness_observer::spawn_observer(
        config.server.clone(),
        Arc::new(AppState::new(Arc::clone(&engine))),
        shutdown_signal(),
    )?;

    let served = match server.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "server task ended abnormally");
            Ok(())
        }
    };

    // 7. Drain outbound queues before exiting.
    sweeper.abort();
    engine.flush().await;
    info!("madness-bot shutdown complete");

    served.map_err(BotError::from)
}

/// Load `madness-config.yaml` from the working directory, or defaults
/// plus environment overrides if it does not exist. The flag reports
/// whether the file was found.
fn load_config() -> Result<(BotConfig, bool), BotError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        return Ok((BotConfig::from_file(path)?, true));
    }
    let mut config = BotConfig::default();
    config.apply_env_overrides()?;
    Ok((config, false))
}

/// `RUST_LOG` wins; otherwise the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), BotError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| BotError::Logging {
            message: format!("invalid log level {:?}: {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let result = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(|e| BotError::Logging {
        message: e.to_string(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

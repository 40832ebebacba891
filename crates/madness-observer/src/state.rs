//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use madness_core::AggregationEngine;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The single aggregation engine all requests go through.
    pub engine: Arc<AggregationEngine>,
}

impl AppState {
    /// Wrap an engine.
    pub const fn new(engine: Arc<AggregationEngine>) -> Self {
        Self { engine }
    }
}

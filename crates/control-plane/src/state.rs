//! Shared application state passed to all handlers via Axum's state.

use std::sync::Arc;

use object_store::ObjectStore;

use crate::config::{AppConfig, SourceTables};

/// Shared application state.
///
/// Holds the configuration, the static source tables, and the two object
/// store handles. Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Static per-source classification tables
    pub tables: Arc<SourceTables>,

    /// Pipeline bucket: extract/transform artifacts and the dataset
    pub pipeline_store: Arc<dyn ObjectStore>,

    /// Vendor bucket: raw export archives awaiting normalization
    pub vendor_store: Arc<dyn ObjectStore>,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pipeline_store: Arc<dyn ObjectStore>,
        vendor_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tables: Arc::new(SourceTables::new()),
            pipeline_store,
            vendor_store,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

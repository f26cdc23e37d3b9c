//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use axum::extract::State;

use rosmetrics_core::collector::CollectorRegistry;
use rosmetrics_core::config::Device;
use rosmetrics_core::metrics::Exposition;
use rosmetrics_core::session::Connector;

/// Everything a scrape needs. Built once at start-up and never mutated.
pub(crate) struct AppInner {
    pub(crate) devices: Vec<Device>,
    pub(crate) registry: CollectorRegistry,
    // Built from `registry.describe()`; rejects anything not described there.
    pub(crate) exposition: Exposition,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) metrics_path: String,
}

impl AppInner {
    pub(crate) fn new(
        devices: Vec<Device>,
        registry: CollectorRegistry,
        connector: Arc<dyn Connector>,
        metrics_path: String,
    ) -> Self {
        let exposition = registry.exposition();
        Self {
            devices,
            registry,
            exposition,
            connector,
            metrics_path,
        }
    }
}

pub(crate) type SharedState = Arc<AppInner>;

pub(crate) type AppState = State<SharedState>;

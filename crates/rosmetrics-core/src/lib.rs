//! rosmetrics-core: shared library for the rosmetrics exporter.
//!
//! Provides:
//! - `config`: YAML configuration (devices, feature flags, `${VAR}` interpolation)
//! - `session`: the RPC seam towards a RouterOS device, the TCP API transport and an in-memory mock
//! - `metrics`: metric descriptors, observations, the output sink and text exposition
//! - `collector`: the per-subsystem collectors and the registry that dispatches them

pub mod collector;
pub mod config;
pub mod metrics;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

/// Crate version reported by the binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

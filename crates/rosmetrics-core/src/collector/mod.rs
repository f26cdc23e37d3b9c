//! Device collectors.
//!
//! One collector per RouterOS subsystem. Every collector implements
//! [`DeviceCollector`]: it owns an immutable table of metric descriptors built
//! at construction and, per scrape, fetches its subsystem's records through
//! the device session and writes observations to the context's sink.
//!
//! ```text
//! CollectorRegistry ──(per device)──▶ CollectorContext { session, device, sink }
//!        │                                   │
//!        ├── InterfaceCollector ─ fetch ─────┤
//!        ├── ResourceCollector  ─ fetch ─────┤──▶ MetricSink ──▶ Exposition
//!        └── QueueTreeCollector ─ fetch ─────┘
//! ```
//!
//! ## Error policy
//!
//! - A failed fetch is fatal for that collector on that device for this scrape:
//!   it is logged with the device name and returned as [`CollectError`]. No
//!   observations are emitted by a collector whose fetch failed.
//! - A field that is present but not numeric is logged and skipped; sibling
//!   fields and records are still processed.
//! - Absent or empty fields are skipped silently.

mod bgp;
mod dhcp;
mod dhcp_lease;
mod dhcpv6;
mod firmware;
mod health;
mod interface;
mod ipsec;
mod monitor;
mod optics;
mod poe;
mod pool;
mod property;
mod queue_tree;
mod registry;
mod resource;
mod routes;
pub mod values;
mod w60g;
mod wlan_interface;
mod wlan_station;

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::config::Device;
use crate::metrics::{Descriptor, MetricSink, Observation};
use crate::session::{Command, Record, Reply, RouterSession, RpcError};

pub use bgp::BgpCollector;
pub use dhcp::DhcpCollector;
pub use dhcp_lease::DhcpLeaseCollector;
pub use dhcpv6::Dhcpv6Collector;
pub use firmware::FirmwareCollector;
pub use health::HealthCollector;
pub use interface::InterfaceCollector;
pub use ipsec::IpsecCollector;
pub use monitor::MonitorCollector;
pub use optics::OpticsCollector;
pub use poe::PoeCollector;
pub use pool::PoolCollector;
pub use property::{PropertySet, PropertySetBuilder};
pub use queue_tree::QueueTreeCollector;
pub use registry::{CollectorRegistry, DeviceReport, fetch_identity};
pub use resource::ResourceCollector;
pub use routes::RoutesCollector;
pub use w60g::W60gCollector;
pub use wlan_interface::WlanInterfaceCollector;
pub use wlan_station::WlanStationCollector;

/// A fetch failed for one collector on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectError {
    pub collector: &'static str,
    pub source: RpcError,
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} collector: {}", self.collector, self.source)
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Everything a collector needs for one device in one scrape.
///
/// Read-only for collectors apart from writes to `sink`.
pub struct CollectorContext<'a> {
    pub session: &'a dyn RouterSession,
    pub device: &'a Device,
    pub sink: &'a MetricSink,
}

impl<'a> CollectorContext<'a> {
    pub fn new(session: &'a dyn RouterSession, device: &'a Device, sink: &'a MetricSink) -> Self {
        Self {
            session,
            device,
            sink,
        }
    }

    pub fn emit(&self, observation: Observation) {
        self.sink.emit(observation);
    }

    pub fn emit_all(&self, observations: impl IntoIterator<Item = Observation>) {
        for obs in observations {
            self.sink.emit(obs);
        }
    }

    /// Label values for the common `(name, address, <entity>, comment)` schema.
    pub fn entity_labels(&self, entity: &str, comment: &str) -> Vec<String> {
        vec![
            self.device.name.clone(),
            self.device.address().to_string(),
            entity.to_string(),
            comment.to_string(),
        ]
    }
}

/// A per-subsystem collector.
///
/// Instances hold only construction-time state, so one instance is shared by
/// every device and every concurrent scrape.
pub trait DeviceCollector: Send + Sync {
    /// Short name used in logs and in the scrape meta metrics.
    fn name(&self) -> &'static str;

    /// Every descriptor this collector can emit.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Fetches this subsystem's records from the device and emits observations.
    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError>;
}

/// Runs `command`, logging a failure with device context.
pub(crate) fn run_command(
    ctx: &CollectorContext<'_>,
    collector: &'static str,
    command: &Command,
) -> Result<Reply, CollectError> {
    ctx.session.run(command).map_err(|e| {
        error!(
            device = %ctx.device.name,
            collector,
            command = %command,
            error = %e,
            "error fetching metrics"
        );
        CollectError {
            collector,
            source: e,
        }
    })
}

/// Runs `command` and returns only its data records.
pub(crate) fn fetch_records(
    ctx: &CollectorContext<'_>,
    collector: &'static str,
    command: &Command,
) -> Result<Vec<Record>, CollectError> {
    run_command(ctx, collector, command).map(|reply| reply.records)
}

/// Runs a count-only `command` and parses the returned `ret`.
///
/// A missing or malformed count is logged and reported as `None`; only a
/// failed request is an error.
pub(crate) fn fetch_count(
    ctx: &CollectorContext<'_>,
    collector: &'static str,
    command: &Command,
) -> Result<Option<f64>, CollectError> {
    let reply = run_command(ctx, collector, command)?;
    let raw = reply.ret().unwrap_or("");
    match values::parse_float(raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            error!(
                device = %ctx.device.name,
                collector,
                command = %command,
                value = raw,
                error = %e,
                "error parsing count reply"
            );
            Ok(None)
        }
    }
}

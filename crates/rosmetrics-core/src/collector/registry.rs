//! The set of enabled collectors and the per-device dispatch loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::{
    BgpCollector, CollectError, CollectorContext, DeviceCollector, DhcpCollector,
    DhcpLeaseCollector, Dhcpv6Collector, FirmwareCollector, HealthCollector, InterfaceCollector,
    IpsecCollector, MonitorCollector, OpticsCollector, PoeCollector, PoolCollector,
    QueueTreeCollector, ResourceCollector, RoutesCollector, W60gCollector,
    WlanInterfaceCollector, WlanStationCollector,
};
use crate::config::{Device, Features};
use crate::metrics::{Descriptor, Exposition, MetricSink, Observation, describe};
use crate::session::{Command, RouterSession, RpcError};

/// Outcome of one device's scrape.
#[derive(Debug)]
pub struct DeviceReport {
    pub device: String,
    pub duration: Duration,
    pub failures: Vec<CollectError>,
}

impl DeviceReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collectors enabled for this process, built once at start-up.
pub struct CollectorRegistry {
    collectors: Vec<Box<dyn DeviceCollector>>,
    duration: Arc<Descriptor>,
    success: Arc<Descriptor>,
}

impl CollectorRegistry {
    pub fn new(collectors: Vec<Box<dyn DeviceCollector>>) -> Self {
        Self {
            collectors,
            duration: Arc::new(describe(
                "scrape",
                "collector_duration_seconds",
                "duration of a collector scrape",
                &["device", "collector"],
            )),
            success: Arc::new(describe(
                "scrape",
                "collector_success",
                "whether a collector succeeded",
                &["device", "collector"],
            )),
        }
    }

    /// Interface and resource collectors plus every enabled feature, in the
    /// order the features are listed in the configuration reference.
    pub fn from_features(features: &Features) -> Self {
        let mut collectors: Vec<Box<dyn DeviceCollector>> = vec![
            Box::new(InterfaceCollector::new()),
            Box::new(ResourceCollector::new()),
        ];
        if features.bgp {
            collectors.push(Box::new(BgpCollector::new()));
        }
        if features.dhcp {
            collectors.push(Box::new(DhcpCollector::new()));
        }
        if features.dhcpl {
            collectors.push(Box::new(DhcpLeaseCollector::new()));
        }
        if features.dhcpv6 {
            collectors.push(Box::new(Dhcpv6Collector::new()));
        }
        if features.firmware {
            collectors.push(Box::new(FirmwareCollector::new()));
        }
        if features.health {
            collectors.push(Box::new(HealthCollector::new()));
        }
        if features.routes {
            collectors.push(Box::new(RoutesCollector::new()));
        }
        if features.poe {
            collectors.push(Box::new(PoeCollector::new()));
        }
        if features.pools {
            collectors.push(Box::new(PoolCollector::new()));
        }
        if features.optics {
            collectors.push(Box::new(OpticsCollector::new()));
        }
        if features.w60g {
            collectors.push(Box::new(W60gCollector::new()));
        }
        if features.wlansta {
            collectors.push(Box::new(WlanStationCollector::new()));
        }
        if features.wlanif {
            collectors.push(Box::new(WlanInterfaceCollector::new()));
        }
        if features.monitor {
            collectors.push(Box::new(MonitorCollector::new()));
        }
        if features.ipsec {
            collectors.push(Box::new(IpsecCollector::new()));
        }
        if features.queue_trees {
            collectors.push(Box::new(QueueTreeCollector::new()));
        }
        Self::new(collectors)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Every descriptor that a scrape may emit.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs: Vec<Arc<Descriptor>> =
            self.collectors.iter().flat_map(|c| c.describe()).collect();
        descs.push(self.duration.clone());
        descs.push(self.success.clone());
        descs
    }

    /// Exposition accepting exactly [`describe`](Self::describe)'s families.
    pub fn exposition(&self) -> Exposition {
        Exposition::new(self.describe())
    }

    /// Runs every collector against one device on a single session.
    ///
    /// A failing collector is logged and recorded; the remaining collectors
    /// still run.
    pub fn collect_device(
        &self,
        session: &dyn RouterSession,
        device: &Device,
        sink: &MetricSink,
    ) -> DeviceReport {
        let started = Instant::now();
        let ctx = CollectorContext::new(session, device, sink);
        let mut failures = Vec::new();

        for collector in &self.collectors {
            let t = Instant::now();
            let result = collector.collect(&ctx);
            let elapsed = t.elapsed();
            debug!(
                device = %device.name,
                collector = collector.name(),
                duration_ms = elapsed.as_millis() as u64,
                ok = result.is_ok(),
                "collector finished"
            );
            self.emit_meta(sink, device, collector.name(), Some(elapsed), result.is_ok());
            if let Err(e) = result {
                failures.push(e);
            }
        }

        let duration = started.elapsed();
        if !failures.is_empty() {
            warn!(
                device = %device.name,
                failed = failures.len(),
                total = self.collectors.len(),
                "device scrape finished with errors"
            );
        }
        DeviceReport {
            device: device.name.clone(),
            duration,
            failures,
        }
    }

    /// Marks every collector as failed for a device that could not be reached.
    pub fn report_unreachable(&self, device: &Device, err: &RpcError, sink: &MetricSink) {
        error!(
            device = %device.name,
            address = device.address(),
            error = %err,
            "error connecting to device"
        );
        for collector in &self.collectors {
            self.emit_meta(sink, device, collector.name(), None, false);
        }
    }

    fn emit_meta(
        &self,
        sink: &MetricSink,
        device: &Device,
        collector: &str,
        elapsed: Option<Duration>,
        ok: bool,
    ) {
        let labels = vec![device.name.clone(), collector.to_string()];
        if let Some(elapsed) = elapsed {
            sink.emit(Observation::gauge(
                self.duration.clone(),
                elapsed.as_secs_f64(),
                labels.clone(),
            ));
        }
        sink.emit(Observation::gauge(
            self.success.clone(),
            if ok { 1.0 } else { 0.0 },
            labels,
        ));
    }
}

/// Reads the device's configured identity (`/system/identity`).
pub fn fetch_identity(session: &dyn RouterSession) -> Result<Option<String>, RpcError> {
    let reply = session.run(&Command::new("/system/identity/print"))?;
    Ok(reply
        .records
        .first()
        .and_then(|r| r.get("name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

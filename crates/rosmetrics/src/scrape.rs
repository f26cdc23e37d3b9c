//! One scrape: every device concurrently, observations drained as they arrive.

use std::fmt;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use rosmetrics_core::collector::{DeviceReport, fetch_identity};
use rosmetrics_core::metrics::{MetricSink, metric_channel};

use crate::srv::{Target, expand_devices};
use crate::state::SharedState;

/// Runs all collectors against all devices and renders the result.
///
/// Devices are scraped on the blocking pool, each with its own session. A
/// device that cannot be reached, fails, or panics does not affect the others.
pub(crate) async fn scrape(state: &SharedState) -> Result<String, fmt::Error> {
    let started = Instant::now();
    let targets = expand_devices(&state.devices).await;
    let target_count = targets.len();

    let (sink, mut rx) = metric_channel();
    let mut tasks = JoinSet::new();
    for target in targets {
        let state = state.clone();
        let sink = sink.clone();
        tasks.spawn_blocking(move || scrape_target(&state, target, &sink));
    }
    // The channel closes once every device task has dropped its clone.
    drop(sink);

    let mut observations = Vec::new();
    while let Some(obs) = rx.recv().await {
        observations.push(obs);
    }

    let mut failed_devices = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(report)) if report.is_success() => {}
            Ok(_) => failed_devices += 1,
            Err(e) => {
                error!(error = %e, "device scrape panicked");
                failed_devices += 1;
            }
        }
    }

    info!(
        targets = target_count,
        failed_devices,
        observations = observations.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "scrape finished"
    );
    state.exposition.render(observations)
}

/// Scrapes one device. `None` when no session could be opened.
fn scrape_target(state: &SharedState, target: Target, sink: &MetricSink) -> Option<DeviceReport> {
    let Target {
        mut device,
        discovered,
    } = target;

    let session = match state.connector.connect(&device) {
        Ok(session) => session,
        Err(e) => {
            state.registry.report_unreachable(&device, &e, sink);
            return None;
        }
    };

    if discovered {
        match fetch_identity(session.as_ref()) {
            Ok(Some(identity)) => {
                debug!(address = device.address(), identity = %identity, "named discovered device");
                device.name = identity;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(address = device.address(), error = %e, "could not read device identity");
            }
        }
    }

    let report = state
        .registry
        .collect_device(session.as_ref(), &device, sink);
    debug!(
        device = %report.device,
        duration_ms = report.duration.as_millis() as u64,
        failures = report.failures.len(),
        "device scraped"
    );
    Some(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use std::io;
    use std::sync::Mutex;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use rosmetrics_core::collector::CollectorRegistry;
    use rosmetrics_core::config::{Device, DnsServer, Features, SrvRecord};
    use rosmetrics_core::session::mock::{MockConnector, MockRouter};
    use rosmetrics_core::session::{Command, Record, RpcError};

    use crate::state::AppInner;

    fn device(name: &str) -> Device {
        Device {
            name: name.into(),
            address: Some(format!("{}.example.com", name)),
            ..Device::default()
        }
    }

    fn resource(cpu: &str) -> MockRouter {
        MockRouter::new().with_records(
            &Command::new("/system/resource/print"),
            vec![Record::from_pairs([("cpu-load", cpu)])],
        )
    }

    fn state(devices: Vec<Device>, connector: MockConnector) -> SharedState {
        Arc::new(AppInner::new(
            devices,
            CollectorRegistry::from_features(&Features::default()),
            Arc::new(connector),
            "/metrics".into(),
        ))
    }

    #[tokio::test]
    async fn scrape_covers_every_device() {
        let connector = MockConnector::new()
            .with_router("edge1", resource("5"))
            .with_router("edge2", resource("9"));
        let state = state(vec![device("edge1"), device("edge2")], connector);

        let out = scrape(&state).await.unwrap();
        assert!(out.contains(
            "mikrotik_system_cpu_load{name=\"edge1\",address=\"edge1.example.com\",boardname=\"\",version=\"\"} 5"
        ));
        assert!(out.contains(
            "mikrotik_system_cpu_load{name=\"edge2\",address=\"edge2.example.com\",boardname=\"\",version=\"\"} 9"
        ));
        assert!(out.contains(
            "mikrotik_scrape_collector_success{device=\"edge2\",collector=\"resource\"} 1"
        ));
    }

    #[tokio::test]
    async fn unreachable_device_does_not_hide_others() {
        let connector = MockConnector::new()
            .with_router("edge1", resource("5"))
            .with_failure("edge2", RpcError::Connection("refused".into()));
        let state = state(vec![device("edge1"), device("edge2")], connector);

        let out = scrape(&state).await.unwrap();
        assert!(out.contains("name=\"edge1\""));
        assert!(!out.contains("name=\"edge2\""));
        assert!(out.contains(
            "mikrotik_scrape_collector_success{device=\"edge2\",collector=\"interface\"} 0"
        ));
        assert!(out.trim_end().ends_with("# EOF"));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn summary_counts_targets_after_srv_expansion() {
        let unresolvable = Device {
            srv: Some(SrvRecord {
                record: "_api._tcp.example.com".into(),
                dns: Some(DnsServer {
                    address: "not-an-ip".into(),
                    port: 53,
                }),
            }),
            ..Device::default()
        };
        let connector = MockConnector::new().with_router("edge1", resource("5"));
        let state = state(vec![device("edge1"), unresolvable], connector);

        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        scrape(&state).await.unwrap();
        let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
        assert!(logs.contains("SRV lookup failed"));
        assert!(logs.contains("scrape finished"));
        assert!(logs.contains("targets=1"), "logs: {logs}");
    }

    #[test]
    fn discovered_device_is_renamed_after_identity() {
        let router = resource("1").with_records(
            &Command::new("/system/identity/print"),
            vec![Record::from_pairs([("name", "core-1")])],
        );
        let connector = MockConnector::new().with_router("r1.example.com", router);
        let state = state(vec![], connector);
        let (sink, mut rx) = metric_channel();

        let report = scrape_target(
            &state,
            Target {
                device: device("r1.example.com"),
                discovered: true,
            },
            &sink,
        )
        .unwrap();
        assert_eq!(report.device, "core-1");
        let obs = rosmetrics_core::metrics::drain_ready(&mut rx);
        assert!(obs.iter().any(|o| o.label("name") == Some("core-1")));
    }
}

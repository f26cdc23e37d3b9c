//! Helpers shared by unit tests.

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use crate::collector::{CollectError, CollectorContext, DeviceCollector};
use crate::config::Device;
use crate::metrics::{Observation, drain_ready, metric_channel};
use crate::session::mock::MockRouter;

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

/// Runs `f` with a thread-local subscriber and returns its result together
/// with everything logged at info level or above.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (out, logs)
}

/// A device with a fixed test address.
pub fn device(name: &str) -> Device {
    Device {
        name: name.to_string(),
        address: Some("10.0.0.1".to_string()),
        user: "prometheus".to_string(),
        password: "secret".to_string(),
        ..Device::default()
    }
}

/// Outcome of running one collector against a mock router.
pub struct CollectRun {
    pub result: Result<(), CollectError>,
    pub observations: Vec<Observation>,
    pub logs: String,
}

impl CollectRun {
    /// The single observation for `metric` whose label `label` equals `value`.
    pub fn find(&self, metric: &str, label: &str, value: &str) -> Option<&Observation> {
        self.observations
            .iter()
            .find(|o| o.descriptor.name() == metric && o.label(label) == Some(value))
    }

    pub fn names(&self) -> Vec<&str> {
        self.observations
            .iter()
            .map(|o| o.descriptor.name())
            .collect()
    }
}

/// Runs `collector` once against `router` for device `edge1`.
pub fn run_collector(collector: &dyn DeviceCollector, router: &MockRouter) -> CollectRun {
    let device = device("edge1");
    let (sink, mut rx) = metric_channel();
    let (result, logs) = capture_logs(|| {
        let ctx = CollectorContext::new(router, &device, &sink);
        collector.collect(&ctx)
    });
    CollectRun {
        result,
        observations: drain_ready(&mut rx),
        logs,
    }
}

//! Wireless clients (`/interface/wireless/registration-table`).
//!
//! `bytes` and `packets` come as `rx,tx` pairs and are split into separate
//! counters. `signal-strength` may carry the rate it was measured at
//! (`-65@6Mbps`); only the level is kept.

use std::sync::Arc;

use super::values::{ValueError, parse_float};
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::{Command, Record};

const NAME: &str = "wlansta";

const PROPERTIES: &[&str] = &[
    "signal-strength",
    "signal-to-noise",
    "tx-ccq",
    "rx-bytes",
    "tx-bytes",
    "rx-packets",
    "tx-packets",
];

const GAUGES: &[&str] = &["signal-strength", "signal-to-noise", "tx-ccq"];

const LABELS: &[&str] = &["name", "address", "interface", "mac_address"];

fn parse_signal(raw: &str) -> Result<f64, ValueError> {
    let level = raw.split('@').next().unwrap_or(raw);
    let level = level.strip_suffix("dBm").unwrap_or(level);
    parse_float(level).map_err(|e| ValueError::new(raw, e.reason))
}

/// Copy of `record` with the `bytes` and `packets` pairs split into `rx-*` and `tx-*` fields.
fn split_pairs(record: &Record) -> Record {
    let mut out = record.clone();
    for property in ["bytes", "packets"] {
        if let Some((rx, tx)) = record.get(property).and_then(|v| v.split_once(',')) {
            out.insert(format!("rx-{}", property), rx);
            out.insert(format!("tx-{}", property), tx);
        }
    }
    out
}

pub struct WlanStationCollector {
    props: PropertySet,
}

impl WlanStationCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "wlanstation", LABELS)
                .properties(PROPERTIES)
                .gauges(GAUGES)
                .help("signal-strength", "client signal strength in dBm")
                .help("signal-to-noise", "client signal to noise ratio in dB")
                .help("tx-ccq", "client transmit connection quality in percent")
                .parser("signal-strength", parse_signal)
                .build(),
        }
    }
}

impl Default for WlanStationCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for WlanStationCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/interface/wireless/registration-table/print");
        for record in &fetch_records(ctx, NAME, &command)? {
            let mac = record.label("mac-address");
            let labels = vec![
                ctx.device.name.clone(),
                ctx.device.address().to_string(),
                record.label("interface").to_string(),
                mac.to_string(),
            ];
            self.props.emit_record(ctx, &split_pairs(record), mac, &labels);
        }
        Ok(())
    }
}

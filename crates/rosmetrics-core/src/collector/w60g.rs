//! 60 GHz wireless links (`/interface/w60g/monitor`).

use std::sync::Arc;

use super::values::{ValueError, parse_float};
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "w60g";

const PROPERTIES: &[&str] = &[
    "signal",
    "rssi",
    "tx-mcs",
    "frequency",
    "tx-phy-rate",
    "tx-sector",
    "distance",
    "tx-packet-error-rate",
];

const LABELS: &[&str] = &["name", "address", "interface"];

/// `12.5m` → 12.5.
fn parse_distance(raw: &str) -> Result<f64, ValueError> {
    parse_float(raw.strip_suffix('m').unwrap_or(raw)).map_err(|e| ValueError::new(raw, e.reason))
}

/// `3%` → 3.
fn parse_percent(raw: &str) -> Result<f64, ValueError> {
    parse_float(raw.strip_suffix('%').unwrap_or(raw)).map_err(|e| ValueError::new(raw, e.reason))
}

pub struct W60gCollector {
    props: PropertySet,
}

impl W60gCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "w60g", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("signal", "signal quality in percent")
                .help("rssi", "received signal strength in dBm")
                .help("tx-phy-rate", "transmit PHY rate in bits per second")
                .help("distance", "estimated link distance in meters")
                .parser("distance", parse_distance)
                .parser("tx-packet-error-rate", parse_percent)
                .build(),
        }
    }
}

impl Default for W60gCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for W60gCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let list = Command::new("/interface/w60g/print").proplist(&["name"]);
        let names: Vec<String> = fetch_records(ctx, NAME, &list)?
            .iter()
            .map(|r| r.label("name").to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let command = Command::new("/interface/w60g/monitor")
            .attribute("numbers", &names.join(","))
            .attribute("once", "");
        for record in &fetch_records(ctx, NAME, &command)? {
            let interface = record.label("name");
            let labels = vec![
                ctx.device.name.clone(),
                ctx.device.address().to_string(),
                interface.to_string(),
            ];
            self.props.emit_record(ctx, record, interface, &labels);
        }
        Ok(())
    }
}

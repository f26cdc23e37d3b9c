//! System resources (`/system/resource`).

use std::sync::Arc;

use super::values::parse_uptime;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "resource";

const PROPERTIES: &[&str] = &[
    "free-memory",
    "total-memory",
    "cpu-load",
    "free-hdd-space",
    "total-hdd-space",
    "uptime",
];

const GAUGES: &[&str] = &[
    "free-memory",
    "total-memory",
    "cpu-load",
    "free-hdd-space",
    "total-hdd-space",
];

const LABELS: &[&str] = &["name", "address", "boardname", "version"];

pub struct ResourceCollector {
    props: PropertySet,
}

impl ResourceCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "system", LABELS)
                .properties(PROPERTIES)
                .gauges(GAUGES)
                .help("uptime", "seconds since the device booted")
                .parser("uptime", parse_uptime)
                .build(),
        }
    }
}

impl Default for ResourceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for ResourceCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/system/resource/print");
        for record in &fetch_records(ctx, NAME, &command)? {
            let board = record.label("board-name");
            let labels = vec![
                ctx.device.name.clone(),
                ctx.device.address().to_string(),
                board.to_string(),
                record.label("version").to_string(),
            ];
            self.props.emit_record(ctx, record, board, &labels);
        }
        Ok(())
    }
}

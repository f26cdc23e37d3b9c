//! Interface traffic counters (`/interface`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "interface";

const PROPERTIES: &[&str] = &[
    "rx-byte",
    "tx-byte",
    "rx-packet",
    "tx-packet",
    "rx-error",
    "tx-error",
    "rx-drop",
    "tx-drop",
    "link-downs",
];

const LABELS: &[&str] = &["name", "address", "interface", "comment"];

pub struct InterfaceCollector {
    props: PropertySet,
}

impl InterfaceCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "interface", LABELS)
                .properties(PROPERTIES)
                .help("link-downs", "number of times the link went down")
                .build(),
        }
    }
}

impl Default for InterfaceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for InterfaceCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/interface/print").query("disabled", "false");
        for record in &fetch_records(ctx, NAME, &command)? {
            let interface = record.label("name");
            let labels = ctx.entity_labels(interface, record.label("comment"));
            self.props.emit_record(ctx, record, interface, &labels);
        }
        Ok(())
    }
}

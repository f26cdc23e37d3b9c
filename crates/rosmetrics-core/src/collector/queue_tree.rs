//! Queue tree statistics (`/queue/tree`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::{Command, Record};

const NAME: &str = "queue_tree";

const PROPERTIES: &[&str] = &[
    "bytes",
    "packets",
    "dropped",
    "rate",
    "packet-rate",
    "queued-packets",
    "queued-bytes",
];

/// Point-in-time values; everything else is cumulative.
const GAUGES: &[&str] = &["rate", "packet-rate", "queued-packets", "queued-bytes"];

const LABELS: &[&str] = &["name", "address", "queue", "comment"];

pub struct QueueTreeCollector {
    props: PropertySet,
}

impl QueueTreeCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "queuetree", LABELS)
                .properties(PROPERTIES)
                .gauges(GAUGES)
                .build(),
        }
    }

    fn fetch(&self, ctx: &CollectorContext<'_>) -> Result<Vec<Record>, CollectError> {
        let command = Command::new("/queue/tree/getall")
            .query("disabled", "false")
            .query("invalid", "false");
        fetch_records(ctx, NAME, &command)
    }
}

impl Default for QueueTreeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for QueueTreeCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let records = self.fetch(ctx)?;
        for record in &records {
            let queue = record.label("name");
            let labels = ctx.entity_labels(queue, record.label("comment"));
            self.props.emit_record(ctx, record, queue, &labels);
        }
        Ok(())
    }
}

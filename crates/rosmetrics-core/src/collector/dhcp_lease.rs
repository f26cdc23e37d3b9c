//! Bound DHCP leases (`/ip/dhcp-server/lease`), one series per lease.

use std::sync::Arc;

use super::values::parse_uptime;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::{Command, Record};

const NAME: &str = "dhcpl";

const LABELS: &[&str] = &[
    "name",
    "address",
    "lease",
    "comment",
    "server",
    "mac_address",
    "host_name",
];

const PROPLIST: &[&str] = &[
    "active-address",
    "active-mac-address",
    "host-name",
    "server",
    "comment",
    "expires-after",
];

pub struct DhcpLeaseCollector {
    props: PropertySet,
    active: Arc<Descriptor>,
}

impl DhcpLeaseCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "dhcpl", LABELS)
                .properties(&["expires-after"])
                .gauges(&["expires-after"])
                .help("expires-after", "seconds until the lease expires")
                .parser("expires-after", parse_uptime)
                .build(),
            active: Arc::new(describe("dhcpl", "active", "bound DHCP lease", LABELS)),
        }
    }

    fn labels(ctx: &CollectorContext<'_>, record: &Record) -> Vec<String> {
        let mut labels = ctx.entity_labels(record.label("active-address"), record.label("comment"));
        labels.extend(
            ["server", "active-mac-address", "host-name"]
                .iter()
                .map(|p| record.label(p).to_string()),
        );
        labels
    }
}

impl Default for DhcpLeaseCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for DhcpLeaseCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = vec![self.active.clone()];
        descs.extend(self.props.descriptors());
        descs
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/ip/dhcp-server/lease/print")
            .query("status", "bound")
            .proplist(PROPLIST);
        for record in &fetch_records(ctx, NAME, &command)? {
            let lease = record.label("active-address");
            let labels = Self::labels(ctx, record);
            ctx.emit(Observation::gauge(self.active.clone(), 1.0, labels.clone()));
            // Static leases never expire.
            if record.get("expires-after") != Some("never") {
                self.props.emit_record(ctx, record, lease, &labels);
            }
        }
        Ok(())
    }
}

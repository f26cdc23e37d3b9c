//! Active DHCP leases per server (`/ip/dhcp-server`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, fetch_count, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::Command;

const NAME: &str = "dhcp";

pub struct DhcpCollector {
    leases: Arc<Descriptor>,
}

impl DhcpCollector {
    pub fn new() -> Self {
        Self {
            leases: Arc::new(describe(
                "dhcp",
                "leases_active_count",
                "number of active leases per DHCP server",
                &["name", "address", "server"],
            )),
        }
    }

    fn server_names(&self, ctx: &CollectorContext<'_>) -> Result<Vec<String>, CollectError> {
        let command = Command::new("/ip/dhcp-server/print").proplist(&["name"]);
        let records = fetch_records(ctx, NAME, &command)?;
        Ok(records
            .iter()
            .filter_map(|r| r.get("name"))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl Default for DhcpCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for DhcpCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.leases.clone()]
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let mut pending = Vec::new();
        for server in self.server_names(ctx)? {
            let command = Command::new("/ip/dhcp-server/lease/print")
                .query("server", &server)
                .count_only();
            if let Some(count) = fetch_count(ctx, NAME, &command)? {
                pending.push(Observation::gauge(
                    self.leases.clone(),
                    count,
                    vec![
                        ctx.device.name.clone(),
                        ctx.device.address().to_string(),
                        server,
                    ],
                ));
            }
        }
        ctx.emit_all(pending);
        Ok(())
    }
}

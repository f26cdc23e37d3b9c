//! DHCPv6 bindings per server (`/ipv6/dhcp-server`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, fetch_count, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::Command;

const NAME: &str = "dhcpv6";

pub struct Dhcpv6Collector {
    bindings: Arc<Descriptor>,
}

impl Dhcpv6Collector {
    pub fn new() -> Self {
        Self {
            bindings: Arc::new(describe(
                "dhcpv6",
                "binding_count",
                "number of active bindings per DHCPv6 server",
                &["name", "address", "server"],
            )),
        }
    }
}

impl Default for Dhcpv6Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for Dhcpv6Collector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.bindings.clone()]
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let servers = Command::new("/ipv6/dhcp-server/print").proplist(&["name"]);
        let names: Vec<String> = fetch_records(ctx, NAME, &servers)?
            .iter()
            .map(|r| r.label("name").to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut pending = Vec::with_capacity(names.len());
        for server in names {
            let command = Command::new("/ipv6/dhcp-server/binding/print")
                .query("server", &server)
                .count_only();
            if let Some(count) = fetch_count(ctx, NAME, &command)? {
                pending.push(Observation::gauge(
                    self.bindings.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockRouter;
    use crate::session::{Record, RpcError};
    use crate::test_support::run_collector;

    fn servers() -> Command {
        Command::new("/ipv6/dhcp-server/print").proplist(&["name"])
    }

    fn bindings(server: &str) -> Command {
        Command::new("/ipv6/dhcp-server/binding/print")
            .query("server", server)
            .count_only()
    }

    #[test]
    fn collect_counts_bindings_per_server() {
        let router = MockRouter::new()
            .with_records(
                &servers(),
                vec![
                    Record::from_pairs([("name", "pd-lan")]),
                    Record::from_pairs([("name", "pd-guest")]),
                ],
            )
            .with_count(&bindings("pd-lan"), 17)
            .with_count(&bindings("pd-guest"), 0);

        let run = run_collector(&Dhcpv6Collector::new(), &router);
        assert!(run.result.is_ok());
        assert_eq!(
            run.find("mikrotik_dhcpv6_binding_count", "server", "pd-lan")
                .map(|o| o.value),
            Some(17.0)
        );
        assert_eq!(
            run.find("mikrotik_dhcpv6_binding_count", "server", "pd-guest")
                .map(|o| o.value),
            Some(0.0)
        );
    }

    #[test]
    fn failed_binding_query_leaves_no_partial_output() {
        let router = MockRouter::new()
            .with_records(
                &servers(),
                vec![
                    Record::from_pairs([("name", "pd-lan")]),
                    Record::from_pairs([("name", "pd-guest")]),
                ],
            )
            .with_count(&bindings("pd-lan"), 17)
            .with_error(&bindings("pd-guest"), RpcError::Timeout);

        let run = run_collector(&Dhcpv6Collector::new(), &router);
        assert!(run.result.is_err());
        assert!(run.observations.is_empty());
        assert!(run.logs.contains("error fetching metrics"));
    }
}

//! Routing table sizes (`/ip/route`, `/ipv6/route`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, fetch_count};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::Command;

const NAME: &str = "routes";

const FAMILIES: &[(&str, &str)] = &[("4", "/ip/route"), ("6", "/ipv6/route")];

/// Route flags counted separately.
const PROTOCOLS: &[&str] = &["bgp", "static", "ospf", "dynamic", "connect", "rip"];

pub struct RoutesCollector {
    total: Arc<Descriptor>,
    protocol: Arc<Descriptor>,
}

impl RoutesCollector {
    pub fn new() -> Self {
        Self {
            total: Arc::new(describe(
                "routes",
                "total_routes",
                "number of active routes",
                &["name", "address", "ip_version"],
            )),
            protocol: Arc::new(describe(
                "routes",
                "protocol",
                "number of active routes per protocol",
                &["name", "address", "ip_version", "protocol"],
            )),
        }
    }

    fn count_command(prefix: &str, protocol: Option<&str>) -> Command {
        let command = Command::new(format!("{}/print", prefix)).query("disabled", "false");
        match protocol {
            Some(protocol) => command.query(protocol, "true").count_only(),
            None => command.count_only(),
        }
    }

    fn collect_family(
        &self,
        ctx: &CollectorContext<'_>,
        ip_version: &str,
        prefix: &str,
        pending: &mut Vec<Observation>,
    ) -> Result<(), CollectError> {
        let device_labels = [ctx.device.name.clone(), ctx.device.address().to_string()];

        if let Some(total) = fetch_count(ctx, NAME, &Self::count_command(prefix, None))? {
            let mut labels = device_labels.to_vec();
            labels.push(ip_version.to_string());
            pending.push(Observation::gauge(self.total.clone(), total, labels));
        }

        for protocol in PROTOCOLS {
            let command = Self::count_command(prefix, Some(*protocol));
            if let Some(count) = fetch_count(ctx, NAME, &command)? {
                let mut labels = device_labels.to_vec();
                labels.push(ip_version.to_string());
                labels.push(protocol.to_string());
                pending.push(Observation::gauge(self.protocol.clone(), count, labels));
            }
        }
        Ok(())
    }
}

impl Default for RoutesCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for RoutesCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.total.clone(), self.protocol.clone()]
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let mut pending = Vec::new();
        for (ip_version, prefix) in FAMILIES {
            self.collect_family(ctx, ip_version, prefix, &mut pending)?;
        }
        ctx.emit_all(pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RpcError;
    use crate::session::mock::MockRouter;
    use crate::test_support::run_collector;

    #[test]
    fn count_commands_filter_disabled_routes() {
        assert_eq!(
            RoutesCollector::count_command("/ip/route", None).to_string(),
            "/ip/route/print ?disabled=false =count-only="
        );
        assert_eq!(
            RoutesCollector::count_command("/ipv6/route", Some("bgp")).to_string(),
            "/ipv6/route/print ?disabled=false ?bgp=true =count-only="
        );
    }

    #[test]
    fn collect_reports_totals_and_protocols() {
        let router = MockRouter::new()
            .with_count(&RoutesCollector::count_command("/ip/route", None), 950_000)
            .with_count(
                &RoutesCollector::count_command("/ip/route", Some("bgp")),
                949_990,
            )
            .with_count(&RoutesCollector::count_command("/ipv6/route", None), 7);

        let run = run_collector(&RoutesCollector::new(), &router);
        assert!(run.result.is_ok());

        let v4 = run
            .find("mikrotik_routes_total_routes", "ip_version", "4")
            .unwrap();
        assert_eq!(v4.value, 950_000.0);
        assert_eq!(
            run.find("mikrotik_routes_total_routes", "ip_version", "6")
                .map(|o| o.value),
            Some(7.0)
        );
        assert_eq!(
            run.find("mikrotik_routes_protocol", "protocol", "bgp")
                .map(|o| o.value),
            Some(949_990.0)
        );

        // Unanswered count queries carry no `ret` and are skipped with a log line.
        let per_protocol = run
            .observations
            .iter()
            .filter(|o| o.descriptor.name() == "mikrotik_routes_protocol")
            .count();
        assert_eq!(per_protocol, 1);
        assert_eq!(router.commands().len(), 2 * (1 + PROTOCOLS.len()));
    }

    #[test]
    fn failure_stops_collector_without_output() {
        let router = MockRouter::new()
            .with_count(&RoutesCollector::count_command("/ip/route", None), 10)
            .with_error(
                &RoutesCollector::count_command("/ip/route", Some("ospf")),
                RpcError::Timeout,
            );

        let run = run_collector(&RoutesCollector::new(), &router);
        assert!(run.result.is_err());
        assert!(run.observations.is_empty());
        // bgp, static, then the failing ospf query.
        assert_eq!(router.commands().len(), 4);
    }
}

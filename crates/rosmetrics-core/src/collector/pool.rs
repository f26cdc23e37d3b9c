//! Address pool usage (`/ip/pool`, `/ipv6/pool`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, fetch_count, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::Command;

const NAME: &str = "pools";

/// `(ip_version label, menu prefix)`
const FAMILIES: &[(&str, &str)] = &[("4", "/ip/pool"), ("6", "/ipv6/pool")];

pub struct PoolCollector {
    used: Arc<Descriptor>,
}

impl PoolCollector {
    pub fn new() -> Self {
        Self {
            used: Arc::new(describe(
                "ip_pool",
                "pool_used_count",
                "number of used addresses per IP pool",
                &["name", "address", "ip_version", "pool"],
            )),
        }
    }

    fn collect_family(
        &self,
        ctx: &CollectorContext<'_>,
        ip_version: &str,
        prefix: &str,
        pending: &mut Vec<Observation>,
    ) -> Result<(), CollectError> {
        let list = Command::new(format!("{}/print", prefix)).proplist(&["name"]);
        let pools = fetch_records(ctx, NAME, &list)?;

        for pool in pools.iter().filter_map(|r| r.get("name")) {
            if pool.is_empty() {
                continue;
            }
            let command = Command::new(format!("{}/used/print", prefix))
                .query("pool", pool)
                .count_only();
            if let Some(count) = fetch_count(ctx, NAME, &command)? {
                pending.push(Observation::gauge(
                    self.used.clone(),
                    count,
                    vec![
                        ctx.device.name.clone(),
                        ctx.device.address().to_string(),
                        ip_version.to_string(),
                        pool.to_string(),
                    ],
                ));
            }
        }
        Ok(())
    }
}

impl Default for PoolCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for PoolCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.used.clone()]
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
    use crate::session::mock::MockRouter;
    use crate::session::{Record, RpcError};
    use crate::test_support::run_collector;

    fn list(prefix: &str) -> Command {
        Command::new(format!("{}/print", prefix)).proplist(&["name"])
    }

    fn used(prefix: &str, pool: &str) -> Command {
        Command::new(format!("{}/used/print", prefix))
            .query("pool", pool)
            .count_only()
    }

    #[test]
    fn collect_counts_both_families() {
        let router = MockRouter::new()
            .with_records(&list("/ip/pool"), vec![Record::from_pairs([("name", "dhcp")])])
            .with_count(&used("/ip/pool", "dhcp"), 12)
            .with_records(&list("/ipv6/pool"), vec![Record::from_pairs([("name", "pd")])])
            .with_count(&used("/ipv6/pool", "pd"), 4);

        let run = run_collector(&PoolCollector::new(), &router);
        assert!(run.result.is_ok());

        let v4 = run
            .find("mikrotik_ip_pool_pool_used_count", "pool", "dhcp")
            .unwrap();
        assert_eq!(v4.value, 12.0);
        assert_eq!(v4.label("ip_version"), Some("4"));

        let v6 = run
            .find("mikrotik_ip_pool_pool_used_count", "pool", "pd")
            .unwrap();
        assert_eq!(v6.value, 4.0);
        assert_eq!(v6.label("ip_version"), Some("6"));
    }

    #[test]
    fn ipv6_failure_discards_ipv4_results() {
        let router = MockRouter::new()
            .with_records(&list("/ip/pool"), vec![Record::from_pairs([("name", "dhcp")])])
            .with_count(&used("/ip/pool", "dhcp"), 12)
            .with_error(
                &list("/ipv6/pool"),
                RpcError::Trap {
                    message: "no such command".into(),
                },
            );

        let run = run_collector(&PoolCollector::new(), &router);
        assert_eq!(run.result.unwrap_err().collector, "pools");
        assert!(run.observations.is_empty());
    }
}

//! BGP peer sessions (`/routing/bgp/peer`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::{Command, Record};

const NAME: &str = "bgp";

const PROPERTIES: &[&str] = &[
    "prefix-count",
    "updates-sent",
    "updates-received",
    "withdrawn-sent",
    "withdrawn-received",
];

const GAUGES: &[&str] = &["prefix-count"];

const LABELS: &[&str] = &["name", "address", "session", "asn"];

pub struct BgpCollector {
    props: PropertySet,
    up: Arc<Descriptor>,
}

impl BgpCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "bgp", LABELS)
                .properties(PROPERTIES)
                .gauges(GAUGES)
                .help("prefix-count", "number of prefixes received from the peer")
                .build(),
            up: Arc::new(describe(
                "bgp",
                "up",
                "BGP session is established (up = 1)",
                LABELS,
            )),
        }
    }

    fn labels(ctx: &CollectorContext<'_>, record: &Record) -> Vec<String> {
        vec![
            ctx.device.name.clone(),
            ctx.device.address().to_string(),
            record.label("name").to_string(),
            record.label("remote-as").to_string(),
        ]
    }
}

impl Default for BgpCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for BgpCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = vec![self.up.clone()];
        descs.extend(self.props.descriptors());
        descs
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/routing/bgp/peer/print").query("disabled", "false");
        for record in &fetch_records(ctx, NAME, &command)? {
            let labels = Self::labels(ctx, record);
            let up = if record.get("state") == Some("established") {
                1.0
            } else {
                0.0
            };
            ctx.emit(Observation::gauge(self.up.clone(), up, labels.clone()));
            self.props
                .emit_record(ctx, record, record.label("name"), &labels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKind;
    use crate::session::RpcError;
    use crate::session::mock::MockRouter;
    use crate::test_support::run_collector;

    fn command() -> Command {
        Command::new("/routing/bgp/peer/print").query("disabled", "false")
    }

    #[test]
    fn collect_reports_session_state_and_counters() {
        let router = MockRouter::new().with_records(
            &command(),
            vec![
                Record::from_pairs([
                    ("name", "transit1"),
                    ("remote-as", "64500"),
                    ("state", "established"),
                    ("prefix-count", "912345"),
                    ("updates-received", "1000"),
                ]),
                Record::from_pairs([
                    ("name", "ix-peer"),
                    ("remote-as", "64501"),
                    ("state", "active"),
                ]),
            ],
        );

        let run = run_collector(&BgpCollector::new(), &router);
        assert!(run.result.is_ok());

        let up = run.find("mikrotik_bgp_up", "session", "transit1").unwrap();
        assert_eq!(up.value, 1.0);
        assert_eq!(up.label("asn"), Some("64500"));
        assert_eq!(
            run.find("mikrotik_bgp_up", "session", "ix-peer").map(|o| o.value),
            Some(0.0)
        );

        let prefixes = run
            .find("mikrotik_bgp_prefix_count", "session", "transit1")
            .unwrap();
        assert_eq!(prefixes.kind, MetricKind::Gauge);
        assert_eq!(
            run.find("mikrotik_bgp_updates_received", "session", "transit1")
                .map(|o| o.kind),
            Some(MetricKind::Counter)
        );
        assert!(run.find("mikrotik_bgp_prefix_count", "session", "ix-peer").is_none());
    }

    #[test]
    fn trap_from_device_fails_collector() {
        let router = MockRouter::new().with_error(
            &command(),
            RpcError::Trap {
                message: "no such command prefix".into(),
            },
        );
        let run = run_collector(&BgpCollector::new(), &router);
        assert!(run.result.is_err());
        assert!(run.observations.is_empty());
        assert!(run.logs.contains("no such command prefix"));
    }
}

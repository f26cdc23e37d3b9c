//! Power over Ethernet output (`/interface/ethernet/poe/monitor`).

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "poe";

const PROPERTIES: &[&str] = &["poe-out-current", "poe-out-voltage", "poe-out-power"];

const LABELS: &[&str] = &["name", "address", "interface"];

pub struct PoeCollector {
    props: PropertySet,
}

impl PoeCollector {
    pub fn new() -> Self {
        Self {
            // No subsystem: the property names already start with `poe`.
            props: PropertySet::builder(NAME, "", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("poe-out-current", "PoE output current in milliamperes")
                .help("poe-out-voltage", "PoE output voltage in volts")
                .help("poe-out-power", "PoE output power in watts")
                .build(),
        }
    }
}

impl Default for PoeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for PoeCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let list = Command::new("/interface/ethernet/poe/print").proplist(&["name"]);
        let names: Vec<String> = fetch_records(ctx, NAME, &list)?
            .iter()
            .map(|r| r.label("name").to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let command = Command::new("/interface/ethernet/poe/monitor")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockRouter;
    use crate::session::{Record, RpcError};
    use crate::test_support::run_collector;

    fn list() -> Command {
        Command::new("/interface/ethernet/poe/print").proplist(&["name"])
    }

    fn monitor() -> Command {
        Command::new("/interface/ethernet/poe/monitor")
            .attribute("numbers", "ether2,ether3")
            .attribute("once", "")
    }

    fn ports() -> Vec<Record> {
        vec![
            Record::from_pairs([("name", "ether2")]),
            Record::from_pairs([("name", "ether3")]),
        ]
    }

    #[test]
    fn collect_reports_poe_output() {
        let router = MockRouter::new()
            .with_records(&list(), ports())
            .with_records(
                &monitor(),
                vec![
                    Record::from_pairs([
                        ("name", "ether2"),
                        ("poe-out-status", "powered-on"),
                        ("poe-out-current", "112"),
                        ("poe-out-voltage", "23.9"),
                        ("poe-out-power", "2.6"),
                    ]),
                    Record::from_pairs([("name", "ether3"), ("poe-out-status", "waiting-for-load")]),
                ],
            );

        let run = run_collector(&PoeCollector::new(), &router);
        assert!(run.result.is_ok());
        assert_eq!(
            run.names(),
            vec![
                "mikrotik_poe_out_current",
                "mikrotik_poe_out_voltage",
                "mikrotik_poe_out_power",
            ]
        );
        assert_eq!(
            run.find("mikrotik_poe_out_voltage", "interface", "ether2")
                .map(|o| o.value),
            Some(23.9)
        );
    }

    #[test]
    fn monitor_failure_fails_the_collector() {
        let router = MockRouter::new()
            .with_records(&list(), ports())
            .with_error(&monitor(), RpcError::Timeout);
        let run = run_collector(&PoeCollector::new(), &router);
        assert!(run.result.is_err());
        assert!(run.observations.is_empty());
    }
}

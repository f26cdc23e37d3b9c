//! SFP module diagnostics (`/interface/ethernet/monitor`, `sfp-*` fields).
//!
//! Ports without a module report none of the fields and produce no series.

use std::collections::HashMap;
use std::sync::Arc;

use super::monitor::ethernet_ports;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "optics";

const PROPERTIES: &[&str] = &[
    "sfp-rx-power",
    "sfp-tx-power",
    "sfp-temperature",
    "sfp-supply-voltage",
    "sfp-tx-bias-current",
];

const LABELS: &[&str] = &["name", "address", "interface", "comment"];

pub struct OpticsCollector {
    props: PropertySet,
}

impl OpticsCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "optics", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("sfp-rx-power", "received optical power in dBm")
                .help("sfp-tx-power", "transmitted optical power in dBm")
                .help("sfp-temperature", "module temperature in degrees celsius")
                .help("sfp-supply-voltage", "module supply voltage in volts")
                .help("sfp-tx-bias-current", "laser bias current in milliamperes")
                .build(),
        }
    }

    fn monitor_command(names: &[&str]) -> Command {
        let mut proplist = vec!["name"];
        proplist.extend_from_slice(PROPERTIES);
        Command::new("/interface/ethernet/monitor")
            .attribute("numbers", &names.join(","))
            .attribute("once", "")
            .proplist(&proplist)
    }
}

impl Default for OpticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for OpticsCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let ports = ethernet_ports(ctx, NAME)?;
        if ports.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = ports.iter().map(|(name, _)| name.as_str()).collect();
        let comments: HashMap<&str, &str> = ports
            .iter()
            .map(|(name, comment)| (name.as_str(), comment.as_str()))
            .collect();
        for record in &fetch_records(ctx, NAME, &Self::monitor_command(&names))? {
            let interface = record.label("name");
            let comment = comments.get(interface).copied().unwrap_or("");
            let labels = ctx.entity_labels(interface, comment);
            self.props.emit_record(ctx, record, interface, &labels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Record;
    use crate::session::mock::MockRouter;
    use crate::test_support::run_collector;

    fn list() -> Command {
        Command::new("/interface/ethernet/print")
            .query("disabled", "false")
            .proplist(&["name", "comment"])
    }

    #[test]
    fn collect_reads_sfp_diagnostics() {
        let monitor = OpticsCollector::monitor_command(&["ether1", "sfp-sfpplus1"]);
        assert_eq!(
            monitor.to_string(),
            "/interface/ethernet/monitor =numbers=ether1,sfp-sfpplus1 =once= \
             =.proplist=name,sfp-rx-power,sfp-tx-power,sfp-temperature,sfp-supply-voltage,sfp-tx-bias-current"
        );
        let router = MockRouter::new()
            .with_records(
                &list(),
                vec![
                    Record::from_pairs([("name", "ether1")]),
                    Record::from_pairs([("name", "sfp-sfpplus1"), ("comment", "uplink")]),
                ],
            )
            .with_records(
                &monitor,
                vec![
                    Record::from_pairs([("name", "ether1")]),
                    Record::from_pairs([
                        ("name", "sfp-sfpplus1"),
                        ("sfp-rx-power", "-5.432"),
                        ("sfp-tx-power", "-2.1"),
                        ("sfp-temperature", "38"),
                        ("sfp-supply-voltage", "3.291"),
                        ("sfp-tx-bias-current", "31"),
                    ]),
                ],
            );

        let run = run_collector(&OpticsCollector::new(), &router);
        assert!(run.result.is_ok());
        assert_eq!(run.observations.len(), 5);
        let rx = run
            .find("mikrotik_optics_sfp_rx_power", "interface", "sfp-sfpplus1")
            .unwrap();
        assert_eq!(rx.value, -5.432);
        assert_eq!(rx.label("comment"), Some("uplink"));
        assert!(run.find("mikrotik_optics_sfp_rx_power", "interface", "ether1").is_none());
    }
}

//! Ethernet link state (`/interface/ethernet/monitor`).

use std::collections::HashMap;
use std::sync::Arc;

use super::values::{ValueError, parse_bool, parse_rate};
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "monitor";

const PROPERTIES: &[&str] = &["status", "rate", "full-duplex"];

const LABELS: &[&str] = &["name", "address", "interface", "comment"];

/// `link-ok` → 1, any other reported status → 0.
fn parse_link_status(raw: &str) -> Result<f64, ValueError> {
    Ok(if raw == "link-ok" { 1.0 } else { 0.0 })
}

pub struct MonitorCollector {
    props: PropertySet,
}

impl MonitorCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "monitor", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("status", "ethernet link is up (link-ok = 1)")
                .help("rate", "negotiated link rate in bits per second")
                .help("full-duplex", "link is full duplex")
                .parser("status", parse_link_status)
                .parser("rate", parse_rate)
                .parser("full-duplex", parse_bool)
                .build(),
        }
    }
}

/// Enabled ethernet ports in device order, with their comments.
pub(super) fn ethernet_ports(
    ctx: &CollectorContext<'_>,
    collector: &'static str,
) -> Result<Vec<(String, String)>, CollectError> {
    let command = Command::new("/interface/ethernet/print")
        .query("disabled", "false")
        .proplist(&["name", "comment"]);
    Ok(fetch_records(ctx, collector, &command)?
        .iter()
        .filter(|r| !r.label("name").is_empty())
        .map(|r| (r.label("name").to_string(), r.label("comment").to_string()))
        .collect())
}

impl Default for MonitorCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for MonitorCollector {
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
        let command = Command::new("/interface/ethernet/monitor")
            .attribute("numbers", &names.join(","))
            .attribute("once", "");
        for record in &fetch_records(ctx, NAME, &command)? {
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
    fn collect_monitors_all_ethernet_ports_in_one_request() {
        let monitor = Command::new("/interface/ethernet/monitor")
            .attribute("numbers", "ether1,ether2")
            .attribute("once", "");
        let router = MockRouter::new()
            .with_records(
                &list(),
                vec![
                    Record::from_pairs([("name", "ether1"), ("comment", "uplink")]),
                    Record::from_pairs([("name", "ether2")]),
                ],
            )
            .with_records(
                &monitor,
                vec![
                    Record::from_pairs([
                        ("name", "ether1"),
                        ("status", "link-ok"),
                        ("rate", "1Gbps"),
                        ("full-duplex", "true"),
                    ]),
                    Record::from_pairs([("name", "ether2"), ("status", "no-link")]),
                ],
            );

        let run = run_collector(&MonitorCollector::new(), &router);
        assert!(run.result.is_ok());
        assert_eq!(router.commands(), vec![list().to_string(), monitor.to_string()]);

        let value = |metric: &str, iface: &str| run.find(metric, "interface", iface).map(|o| o.value);
        assert_eq!(value("mikrotik_monitor_status", "ether1"), Some(1.0));
        assert_eq!(value("mikrotik_monitor_rate", "ether1"), Some(1e9));
        assert_eq!(value("mikrotik_monitor_full_duplex", "ether1"), Some(1.0));
        assert_eq!(value("mikrotik_monitor_status", "ether2"), Some(0.0));
        assert_eq!(value("mikrotik_monitor_rate", "ether2"), None);

        let ether1 = run.find("mikrotik_monitor_status", "interface", "ether1").unwrap();
        assert_eq!(ether1.label("comment"), Some("uplink"));
        let ether2 = run.find("mikrotik_monitor_status", "interface", "ether2").unwrap();
        assert_eq!(ether2.label("comment"), Some(""));
    }

    #[test]
    fn no_ethernet_ports_means_no_monitor_request() {
        let router = MockRouter::new();
        let run = run_collector(&MonitorCollector::new(), &router);
        assert!(run.result.is_ok());
        assert!(run.observations.is_empty());
        assert_eq!(router.commands(), vec![list().to_string()]);
    }
}

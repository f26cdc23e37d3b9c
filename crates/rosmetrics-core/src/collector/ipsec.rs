//! IPsec peers (`/ip/ipsec/active-peers`).

use std::sync::Arc;

use super::values::parse_uptime;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::{Command, Record};

const NAME: &str = "ipsec";

const PROPERTIES: &[&str] = &["rx-bytes", "tx-bytes", "rx-packets", "tx-packets", "uptime"];

const LABELS: &[&str] = &["name", "address", "peer", "local_address"];

pub struct IpsecCollector {
    props: PropertySet,
    established: Arc<Descriptor>,
}

impl IpsecCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "ipsec", LABELS)
                .properties(PROPERTIES)
                .help("uptime", "seconds since the peer was established")
                .parser("uptime", parse_uptime)
                .build(),
            established: Arc::new(describe(
                "ipsec",
                "established",
                "IPsec peer is established (established = 1)",
                LABELS,
            )),
        }
    }

    /// The remote address identifies the peer; older firmware only reports `id`.
    fn peer(record: &Record) -> &str {
        record
            .get("remote-address")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| record.label("id"))
    }
}

impl Default for IpsecCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for IpsecCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = vec![self.established.clone()];
        descs.extend(self.props.descriptors());
        descs
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let command = Command::new("/ip/ipsec/active-peers/print");
        for record in &fetch_records(ctx, NAME, &command)? {
            let peer = Self::peer(record);
            let labels = vec![
                ctx.device.name.clone(),
                ctx.device.address().to_string(),
                peer.to_string(),
                record.label("local-address").to_string(),
            ];
            let established = if record.get("state") == Some("established") {
                1.0
            } else {
                0.0
            };
            ctx.emit(Observation::gauge(
                self.established.clone(),
                established,
                labels.clone(),
            ));
            self.props.emit_record(ctx, record, peer, &labels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKind;
    use crate::session::mock::MockRouter;
    use crate::test_support::run_collector;

    #[test]
    fn collect_reports_peer_state_and_traffic() {
        let router = MockRouter::new().with_records(
            &Command::new("/ip/ipsec/active-peers/print"),
            vec![
                Record::from_pairs([
                    ("id", "branch-1"),
                    ("remote-address", "198.51.100.7"),
                    ("local-address", "203.0.113.1"),
                    ("state", "established"),
                    ("uptime", "2d3h"),
                    ("rx-bytes", "1048576"),
                    ("tx-bytes", "524288"),
                    ("rx-packets", "900"),
                    ("tx-packets", "800"),
                ]),
                Record::from_pairs([("id", "branch-2"), ("state", "message-1-sent")]),
            ],
        );

        let run = run_collector(&IpsecCollector::new(), &router);
        assert!(run.result.is_ok());

        let up = run
            .find("mikrotik_ipsec_established", "peer", "198.51.100.7")
            .unwrap();
        assert_eq!(up.value, 1.0);
        assert_eq!(up.label("local_address"), Some("203.0.113.1"));
        assert_eq!(
            run.find("mikrotik_ipsec_established", "peer", "branch-2")
                .map(|o| o.value),
            Some(0.0)
        );

        let rx = run
            .find("mikrotik_ipsec_rx_bytes", "peer", "198.51.100.7")
            .unwrap();
        assert_eq!(rx.kind, MetricKind::Counter);
        assert_eq!(rx.value, 1048576.0);
        assert_eq!(
            run.find("mikrotik_ipsec_uptime", "peer", "198.51.100.7")
                .map(|o| o.value),
            Some((2 * 86_400 + 3 * 3_600) as f64)
        );
    }
}

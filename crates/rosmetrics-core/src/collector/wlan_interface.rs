//! Wireless interfaces (`/interface/wireless/monitor`).
//!
//! Each interface is monitored on its own so that its current channel can be
//! attached as a label.

use std::sync::Arc;

use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "wlanif";

const PROPERTIES: &[&str] = &["registered-clients", "noise-floor", "overall-tx-ccq"];

const LABELS: &[&str] = &["name", "address", "interface", "channel"];

pub struct WlanInterfaceCollector {
    props: PropertySet,
}

impl WlanInterfaceCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "wlanif", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("registered-clients", "number of registered clients")
                .help("noise-floor", "noise floor in dBm")
                .help("overall-tx-ccq", "overall transmit connection quality in percent")
                .build(),
        }
    }
}

impl Default for WlanInterfaceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for WlanInterfaceCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let list = Command::new("/interface/wireless/print")
            .query("disabled", "false")
            .proplist(&["name"]);
        let names: Vec<String> = fetch_records(ctx, NAME, &list)?
            .iter()
            .map(|r| r.label("name").to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut pending = Vec::new();
        for interface in &names {
            let command = Command::new("/interface/wireless/monitor")
                .attribute("numbers", interface)
                .attribute("once", "");
            for record in &fetch_records(ctx, NAME, &command)? {
                let labels = vec![
                    ctx.device.name.clone(),
                    ctx.device.address().to_string(),
                    interface.clone(),
                    record.label("channel").to_string(),
                ];
                pending.extend(
                    self.props
                        .observe_record(ctx.device, record, interface, &labels),
                );
            }
        }
        ctx.emit_all(pending);
        Ok(())
    }
}

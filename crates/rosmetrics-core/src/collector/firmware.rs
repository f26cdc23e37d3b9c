//! Installed packages and their versions (`/system/package`).

use std::sync::Arc;

use super::values::parse_bool;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::Descriptor;
use crate::session::Command;

const NAME: &str = "firmware";

const LABELS: &[&str] = &["name", "address", "package", "version", "build_time"];

pub struct FirmwareCollector {
    props: PropertySet,
}

impl FirmwareCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "system_package", LABELS)
                .properties(&["disabled"])
                .gauges(&["disabled"])
                .help("disabled", "package is installed but disabled")
                .parser("disabled", parse_bool)
                .build(),
        }
    }
}

impl Default for FirmwareCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for FirmwareCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.props.descriptors()
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        for record in &fetch_records(ctx, NAME, &Command::new("/system/package/getall"))? {
            let package = record.label("name");
            let labels = vec![
                ctx.device.name.clone(),
                ctx.device.address().to_string(),
                package.to_string(),
                record.label("version").to_string(),
                record.label("build-time").to_string(),
            ];
            self.props.emit_record(ctx, record, package, &labels);
        }
        Ok(())
    }
}

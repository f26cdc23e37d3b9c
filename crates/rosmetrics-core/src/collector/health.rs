//! Board health sensors (`/system/health`).
//!
//! RouterOS 6 reports a single record with one property per sensor. RouterOS 7
//! reports one `{name, value, type}` record per sensor instead; those become
//! `mikrotik_health_sensor{sensor="<name>"}`. Rows without a unit in `type`
//! report a state such as `ok` and become `mikrotik_health_state` (ok = 1).

use std::sync::Arc;

use tracing::error;

use super::values::parse_float;
use super::{CollectError, CollectorContext, DeviceCollector, PropertySet, fetch_records};
use crate::metrics::{Descriptor, Observation, describe};
use crate::session::{Command, Record};

const NAME: &str = "health";

const PROPERTIES: &[&str] = &["voltage", "temperature"];

const LABELS: &[&str] = &["name", "address"];

pub struct HealthCollector {
    props: PropertySet,
    sensor: Arc<Descriptor>,
    state: Arc<Descriptor>,
}

impl HealthCollector {
    pub fn new() -> Self {
        Self {
            props: PropertySet::builder(NAME, "health", LABELS)
                .properties(PROPERTIES)
                .gauges(PROPERTIES)
                .help("voltage", "input voltage in volts")
                .help("temperature", "board temperature in degrees celsius")
                .build(),
            sensor: Arc::new(describe(
                "health",
                "sensor",
                "value of a health sensor",
                &["name", "address", "sensor"],
            )),
            state: Arc::new(describe(
                "health",
                "state",
                "health sensor state is ok",
                &["name", "address", "sensor"],
            )),
        }
    }

    fn collect_sensor(&self, ctx: &CollectorContext<'_>, record: &Record) {
        let sensor = record.label("name");
        let Some(raw) = record.get("value").filter(|v| !v.is_empty()) else {
            return;
        };
        let labels = vec![
            ctx.device.name.clone(),
            ctx.device.address().to_string(),
            sensor.to_string(),
        ];
        if record.label("type").is_empty() {
            let ok = if raw == "ok" { 1.0 } else { 0.0 };
            ctx.emit(Observation::gauge(self.state.clone(), ok, labels));
            return;
        }
        match parse_float(raw) {
            Ok(value) => ctx.emit(Observation::gauge(self.sensor.clone(), value, labels)),
            Err(e) => error!(
                device = %ctx.device.name,
                collector = NAME,
                entity = sensor,
                property = "value",
                value = raw,
                error = %e,
                "error parsing metric value"
            ),
        }
    }
}

impl Default for HealthCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollector for HealthCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = self.props.descriptors();
        descs.push(self.sensor.clone());
        descs.push(self.state.clone());
        descs
    }

    fn collect(&self, ctx: &CollectorContext<'_>) -> Result<(), CollectError> {
        let records = fetch_records(ctx, NAME, &Command::new("/system/health/print"))?;
        for record in &records {
            if record.get("name").is_some() && record.get("value").is_some() {
                self.collect_sensor(ctx, record);
            } else {
                let labels = vec![ctx.device.name.clone(), ctx.device.address().to_string()];
                self.props.emit_record(ctx, record, "health", &labels);
            }
        }
        Ok(())
    }
}

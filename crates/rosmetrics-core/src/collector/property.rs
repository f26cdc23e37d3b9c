//! Property-to-metric mapping shared by the record-based collectors.

use std::sync::Arc;

use tracing::error;

use super::CollectorContext;
use super::values::{ValueParser, parse_float};
use crate::config::Device;
use crate::metrics::{Descriptor, MetricKind, Observation, property_descriptors};
use crate::session::Record;

#[derive(Debug)]
struct PropertyMetric {
    property: String,
    descriptor: Arc<Descriptor>,
    kind: MetricKind,
    parse: ValueParser,
}

/// Ordered set of properties a collector turns into metrics.
///
/// Built once at collector construction. Each property's descriptor, kind
/// (counter or gauge) and value parser are fixed from then on, so the same
/// property is always emitted with the same kind whatever its value.
#[derive(Debug)]
pub struct PropertySet {
    collector: &'static str,
    metrics: Vec<PropertyMetric>,
}

/// Builder for [`PropertySet`].
pub struct PropertySetBuilder<'a> {
    collector: &'static str,
    subsystem: &'a str,
    labels: &'a [&'a str],
    properties: &'a [&'a str],
    gauges: &'a [&'a str],
    help: Vec<(&'a str, &'a str)>,
    parsers: Vec<(&'a str, ValueParser)>,
}

impl<'a> PropertySetBuilder<'a> {
    /// Properties to export, in emission order.
    pub fn properties(mut self, properties: &'a [&'a str]) -> Self {
        self.properties = properties;
        self
    }

    /// Properties exported as gauges; all others are counters.
    pub fn gauges(mut self, gauges: &'a [&'a str]) -> Self {
        self.gauges = gauges;
        self
    }

    /// Help text for `property` instead of the property name.
    pub fn help(mut self, property: &'a str, text: &'a str) -> Self {
        self.help.push((property, text));
        self
    }

    /// Parser for `property` instead of [`parse_float`].
    pub fn parser(mut self, property: &'a str, parse: ValueParser) -> Self {
        self.parsers.push((property, parse));
        self
    }

    pub fn build(self) -> PropertySet {
        let metrics = property_descriptors(self.subsystem, self.properties, self.labels, &self.help)
            .into_iter()
            .map(|(property, descriptor)| {
                let kind = if self.gauges.contains(&property.as_str()) {
                    MetricKind::Gauge
                } else {
                    MetricKind::Counter
                };
                let parse = self
                    .parsers
                    .iter()
                    .find(|(p, _)| *p == property)
                    .map(|(_, f)| *f)
                    .unwrap_or(parse_float as ValueParser);
                PropertyMetric {
                    property,
                    descriptor,
                    kind,
                    parse,
                }
            })
            .collect();

        PropertySet {
            collector: self.collector,
            metrics,
        }
    }
}

impl PropertySet {
    /// Starts a set for `collector`, naming metrics `mikrotik_<subsystem>_<property>`
    /// with the given label schema.
    pub fn builder<'a>(
        collector: &'static str,
        subsystem: &'a str,
        labels: &'a [&'a str],
    ) -> PropertySetBuilder<'a> {
        PropertySetBuilder {
            collector,
            subsystem,
            labels,
            properties: &[],
            gauges: &[],
            help: Vec::new(),
            parsers: Vec::new(),
        }
    }

    pub fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        self.metrics.iter().map(|m| m.descriptor.clone()).collect()
    }

    /// Property names in emission order.
    pub fn properties(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.property.as_str()).collect()
    }

    /// Kind a property is emitted as, `None` if it is not part of the set.
    pub fn kind_of(&self, property: &str) -> Option<MetricKind> {
        self.metrics
            .iter()
            .find(|m| m.property == property)
            .map(|m| m.kind)
    }

    /// Converts every property of `record` that has a usable value.
    ///
    /// `entity` identifies the record in logs; `label_values` are attached to
    /// every observation and must match the set's label schema.
    pub fn observe_record(
        &self,
        device: &Device,
        record: &Record,
        entity: &str,
        label_values: &[String],
    ) -> Vec<Observation> {
        self.metrics
            .iter()
            .filter_map(|metric| {
                self.observe_property(metric, device, record.get(&metric.property), entity, label_values)
            })
            .collect()
    }

    /// Like [`observe_record`](Self::observe_record) for the context's device,
    /// writing straight to its sink.
    pub fn emit_record(
        &self,
        ctx: &CollectorContext<'_>,
        record: &Record,
        entity: &str,
        label_values: &[String],
    ) {
        ctx.emit_all(self.observe_record(ctx.device, record, entity, label_values));
    }

    fn observe_property(
        &self,
        metric: &PropertyMetric,
        device: &Device,
        raw: Option<&str>,
        entity: &str,
        label_values: &[String],
    ) -> Option<Observation> {
        let raw = raw.filter(|v| !v.is_empty())?;
        match (metric.parse)(raw) {
            Ok(value) => Some(Observation::new(
                metric.descriptor.clone(),
                metric.kind,
                value,
                label_values.to_vec(),
            )),
            Err(e) => {
                error!(
                    device = %device.name,
                    collector = self.collector,
                    entity,
                    property = %metric.property,
                    value = raw,
                    error = %e,
                    "error parsing metric value"
                );
                None
            }
        }
    }
}

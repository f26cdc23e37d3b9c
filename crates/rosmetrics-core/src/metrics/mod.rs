//! Metric descriptors, observations and the output sink.
//!
//! A [`Descriptor`] names a metric family and fixes its label schema. It is
//! built once when a collector is constructed and shared by reference across
//! every scrape and every device. An [`Observation`] is one value for one
//! label tuple, written once to a [`MetricSink`] and never retained.

mod exposition;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

pub use exposition::{CONTENT_TYPE, Exposition};

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "mikrotik";

/// Immutable description of a metric family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    name: String,
    help: String,
    labels: Vec<String>,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Fully-qualified metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Label names, in the order label values must be supplied.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Joins the non-empty parts with `_`. An empty `name` yields an empty string.
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Turns a RouterOS property name into a metric name component.
pub fn metric_name_cleanup(property: &str) -> String {
    property.replace('-', "_")
}

/// Descriptor for a device property; the property name doubles as help text.
pub fn describe_property(subsystem: &str, property: &str, labels: &[&str]) -> Descriptor {
    describe_property_with_help(subsystem, property, labels, property)
}

/// Descriptor for a device property with explicit help text.
pub fn describe_property_with_help(
    subsystem: &str,
    property: &str,
    labels: &[&str],
    help: &str,
) -> Descriptor {
    Descriptor::new(
        fq_name(NAMESPACE, subsystem, &metric_name_cleanup(property)),
        help,
        labels,
    )
}

/// Descriptor for a metric that does not map to a single device property.
pub fn describe(subsystem: &str, name: &str, help: &str, labels: &[&str]) -> Descriptor {
    Descriptor::new(fq_name(NAMESPACE, subsystem, name), help, labels)
}

/// Builds one descriptor per property, in the given order.
///
/// `help` overrides the default help text for the properties it names.
pub fn property_descriptors(
    subsystem: &str,
    properties: &[&str],
    labels: &[&str],
    help: &[(&str, &str)],
) -> Vec<(String, Arc<Descriptor>)> {
    properties
        .iter()
        .map(|&property| {
            let desc = match help.iter().find(|(p, _)| *p == property) {
                Some((_, text)) => describe_property_with_help(subsystem, property, labels, text),
                None => describe_property(subsystem, property, labels),
            };
            (property.to_string(), Arc::new(desc))
        })
        .collect()
}

/// Value type of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Cumulative, monotonically increasing.
    Counter,
    /// Point-in-time value.
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

/// One metric value with its label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub descriptor: Arc<Descriptor>,
    pub kind: MetricKind,
    pub value: f64,
    /// Label values, positionally matching `descriptor.labels()`.
    pub label_values: Vec<String>,
}

impl Observation {
    pub fn new(
        descriptor: Arc<Descriptor>,
        kind: MetricKind,
        value: f64,
        label_values: Vec<String>,
    ) -> Self {
        debug_assert_eq!(
            descriptor.labels().len(),
            label_values.len(),
            "label arity mismatch for {}",
            descriptor.name()
        );
        Self {
            descriptor,
            kind,
            value,
            label_values,
        }
    }

    pub fn counter(descriptor: Arc<Descriptor>, value: f64, label_values: Vec<String>) -> Self {
        Self::new(descriptor, MetricKind::Counter, value, label_values)
    }

    pub fn gauge(descriptor: Arc<Descriptor>, value: f64, label_values: Vec<String>) -> Self {
        Self::new(descriptor, MetricKind::Gauge, value, label_values)
    }

    /// Value of the label called `name`, if the descriptor has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .labels()
            .iter()
            .position(|l| l == name)
            .and_then(|idx| self.label_values.get(idx))
            .map(String::as_str)
    }
}

/// Receiving end of a scrape's observation channel.
pub type ObservationReceiver = mpsc::UnboundedReceiver<Observation>;

/// Shared output channel for observations.
///
/// Cloneable and safe to write from many threads at once. Writing never
/// blocks. Collectors only write to it; the channel closes when the last
/// sink clone is dropped by whoever created it.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<Observation>,
}

impl MetricSink {
    pub fn emit(&self, observation: Observation) {
        if let Err(e) = self.tx.send(observation) {
            trace!(metric = e.0.descriptor.name(), "observation dropped, reader gone");
        }
    }
}

/// Creates a sink and the receiver that drains it.
pub fn metric_channel() -> (MetricSink, ObservationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricSink { tx }, rx)
}

/// Drains every observation currently buffered in `rx` without waiting.
pub fn drain_ready(rx: &mut ObservationReceiver) -> Vec<Observation> {
    let mut out = Vec::new();
    while let Ok(obs) = rx.try_recv() {
        out.push(obs);
    }
    out
}

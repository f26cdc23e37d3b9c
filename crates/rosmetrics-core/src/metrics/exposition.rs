//! OpenMetrics text exposition of a scrape's observations.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tracing::warn;

use super::{Descriptor, MetricKind, Observation};

/// Content type of [`Exposition::render`] output.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Renders observations for every descriptor registered at start-up.
///
/// Only described metric families are exposed. Observations that reference
/// an unknown descriptor or carry the wrong number of label values are
/// dropped with a warning rather than failing the whole scrape.
#[derive(Debug, Default)]
pub struct Exposition {
    described: HashMap<String, Arc<Descriptor>>,
}

impl Exposition {
    pub fn new(descriptors: impl IntoIterator<Item = Arc<Descriptor>>) -> Self {
        let mut described: HashMap<String, Arc<Descriptor>> = HashMap::new();
        for desc in descriptors {
            match described.get(desc.name()) {
                Some(existing) if **existing != *desc => {
                    warn!(metric = desc.name(), "conflicting descriptors, keeping the first");
                }
                Some(_) => {}
                None => {
                    described.insert(desc.name().to_string(), desc);
                }
            }
        }
        Self { described }
    }

    /// Number of registered metric families.
    pub fn len(&self) -> usize {
        self.described.len()
    }

    pub fn is_empty(&self) -> bool {
        self.described.is_empty()
    }

    pub fn is_described(&self, descriptor: &Descriptor) -> bool {
        self.described
            .get(descriptor.name())
            .is_some_and(|d| **d == *descriptor)
    }

    /// Encodes `observations` as OpenMetrics text.
    ///
    /// Families are ordered by name and samples by label values, so equal
    /// input yields equal output regardless of arrival order.
    pub fn render(&self, observations: Vec<Observation>) -> Result<String, fmt::Error> {
        let batch = self.batch(observations);
        let mut registry = Registry::default();
        registry.register_collector(Box::new(batch));

        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &registry)?;
        Ok(out)
    }

    fn batch(&self, observations: Vec<Observation>) -> ScrapeBatch {
        let mut families: BTreeMap<String, Family> = BTreeMap::new();

        for obs in observations {
            if !self.is_described(&obs.descriptor) {
                warn!(metric = obs.descriptor.name(), "dropping observation for undescribed metric");
                continue;
            }
            if obs.label_values.len() != obs.descriptor.labels().len() {
                warn!(
                    metric = obs.descriptor.name(),
                    expected = obs.descriptor.labels().len(),
                    got = obs.label_values.len(),
                    "dropping observation with wrong label count"
                );
                continue;
            }

            let family = families
                .entry(obs.descriptor.name().to_string())
                .or_insert_with(|| Family {
                    descriptor: obs.descriptor.clone(),
                    kind: obs.kind,
                    samples: Vec::new(),
                    seen: HashSet::new(),
                });

            if family.kind != obs.kind {
                warn!(
                    metric = obs.descriptor.name(),
                    expected = %family.kind,
                    got = %obs.kind,
                    "dropping observation with inconsistent kind"
                );
                continue;
            }
            if !family.seen.insert(obs.label_values.clone()) {
                warn!(
                    metric = obs.descriptor.name(),
                    labels = ?obs.label_values,
                    "dropping duplicate sample"
                );
                continue;
            }
            family.samples.push((obs.label_values, obs.value));
        }

        let mut families: Vec<Family> = families.into_values().collect();
        for family in &mut families {
            family.samples.sort_by(|a, b| a.0.cmp(&b.0));
        }
        ScrapeBatch { families }
    }
}

#[derive(Debug)]
struct Family {
    descriptor: Arc<Descriptor>,
    kind: MetricKind,
    samples: Vec<(Vec<String>, f64)>,
    seen: HashSet<Vec<String>>,
}

/// One scrape's worth of constant metrics, handed to the encoder.
#[derive(Debug)]
struct ScrapeBatch {
    families: Vec<Family>,
}

impl Collector for ScrapeBatch {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        for family in &self.families {
            let metric_type = match family.kind {
                MetricKind::Counter => MetricType::Counter,
                MetricKind::Gauge => MetricType::Gauge,
            };
            let mut metric_encoder = encoder.encode_descriptor(
                family.descriptor.name(),
                family.descriptor.help(),
                None,
                metric_type,
            )?;

            for (values, value) in &family.samples {
                let labels: Vec<(&str, &str)> = family
                    .descriptor
                    .labels()
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().map(String::as_str))
                    .collect();
                let sample_encoder = metric_encoder.encode_family(&labels)?;
                match family.kind {
                    MetricKind::Counter => ConstCounter::new(*value).encode(sample_encoder)?,
                    MetricKind::Gauge => ConstGauge::new(*value).encode(sample_encoder)?,
                }
            }
        }
        Ok(())
    }
}

//! Exposition of projected observations through the Prometheus registry
//!
//! `TaskMetricsCollector` keeps the metric families of the last successful
//! scrape. A failed scrape never publishes, so the previous snapshot stays
//! exposed until the next successful one replaces it.

use crate::projection::{catalog, MetricDescriptor, MetricKind, Observation};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Errors raised while publishing observations
#[derive(Debug, Error)]
pub enum ExpositionError {
    /// The same series was observed twice with different values
    #[error("conflicting values for {metric}{{{labels}}}: {existing} and {conflicting}")]
    ConflictingSample {
        metric: &'static str,
        labels: String,
        existing: f64,
        conflicting: f64,
    },

    #[error("invalid metric descriptor: {0}")]
    Descriptor(#[from] prometheus::Error),
}

struct Inner {
    descs: Vec<Desc>,
    snapshot: RwLock<Vec<MetricFamily>>,
}

/// Prometheus collector serving the latest projected snapshot
#[derive(Clone)]
pub struct TaskMetricsCollector {
    inner: Arc<Inner>,
}

impl TaskMetricsCollector {
    /// Create a collector describing every catalog metric
    pub fn new() -> Result<Self, ExpositionError> {
        let mut descs: Vec<Desc> = Vec::new();
        for descriptor in catalog::all() {
            // Both CPU identities share one series name
            if descs.iter().any(|d| d.fq_name == descriptor.name) {
                continue;
            }
            let label_names = descriptor.label_names.iter().map(|l| l.to_string());
            let desc = Desc::new(
                descriptor.name.to_string(),
                descriptor.help.to_string(),
                label_names.collect(),
                HashMap::new(),
            )?;
            descs.push(desc);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                descs,
                snapshot: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Replace the exposed snapshot with the given observations
    ///
    /// Exact repeats of a series are collapsed. A repeated series with a
    /// different value is rejected and the previous snapshot is kept.
    /// Returns the number of distinct samples published.
    pub fn publish(&self, observations: Vec<Observation>) -> Result<usize, ExpositionError> {
        let families = build_families(observations)?;
        let samples = families.iter().map(|f| f.get_metric().len()).sum();

        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = families;

        Ok(samples)
    }

    /// Number of samples currently exposed
    pub fn sample_count(&self) -> usize {
        self.snapshot().iter().map(|f| f.get_metric().len()).sum()
    }

    fn snapshot(&self) -> Vec<MetricFamily> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Collector for TaskMetricsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.snapshot()
    }
}

type SeriesKey = (&'static str, &'static [&'static str], Vec<String>);

fn build_families(observations: Vec<Observation>) -> Result<Vec<MetricFamily>, ExpositionError> {
    let order = catalog::all();
    let mut seen: HashMap<SeriesKey, f64> = HashMap::new();
    let mut families: BTreeMap<(usize, &'static str), MetricFamily> = BTreeMap::new();

    for obs in observations {
        let key = (
            obs.metric.name,
            obs.metric.label_names,
            obs.label_values.clone(),
        );
        if let Some(existing) = seen.get(&key) {
            if *existing == obs.value {
                continue;
            }
            return Err(ExpositionError::ConflictingSample {
                metric: obs.metric.name,
                labels: format_labels(&obs),
                existing: *existing,
                conflicting: obs.value,
            });
        }
        seen.insert(key, obs.value);

        let position = order
            .iter()
            .position(|d| d.name == obs.metric.name)
            .unwrap_or(order.len());
        families
            .entry((position, obs.metric.name))
            .or_insert_with(|| new_family(obs.metric))
            .mut_metric()
            .push(to_metric(&obs));
    }

    Ok(families.into_values().collect())
}

fn new_family(descriptor: &MetricDescriptor) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(descriptor.name.to_string());
    family.set_help(descriptor.help.to_string());
    family.set_field_type(descriptor.kind.as_proto());
    family
}

fn to_metric(obs: &Observation) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in obs.metric.label_names.iter().zip(&obs.label_values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }

    match obs.metric.kind {
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(obs.value);
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(obs.value);
            metric.set_counter(counter);
        }
    }

    metric
}

fn format_labels(obs: &Observation) -> String {
    obs.metric
        .label_names
        .iter()
        .zip(&obs.label_values)
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(",")
}

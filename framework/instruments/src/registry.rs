use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use surge_summary_model::MetricSummary;

use crate::iteration::IterationRecord;
use crate::trend::TrendSamples;

/// Names of the metrics the runner records for every VU iteration.
pub mod builtin {
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_SUCCESS: &str = "iteration_success";
    pub const ITERATION_DURATION: &str = "iteration_duration";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

/// A metric name was reused with a different kind to the one it was first recorded as.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Metric [{name}] is a {registered}, cannot record it as a {requested}")]
pub struct MetricKindError {
    pub name: String,
    pub registered: MetricKind,
    pub requested: MetricKind,
}

#[derive(Debug)]
enum Metric {
    Counter(AtomicU64),
    Rate { passes: AtomicU64, fails: AtomicU64 },
    Trend(Mutex<Vec<Duration>>),
}

impl Metric {
    fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Metric::Counter(AtomicU64::new(0)),
            MetricKind::Rate => Metric::Rate {
                passes: AtomicU64::new(0),
                fails: AtomicU64::new(0),
            },
            MetricKind::Trend => Metric::Trend(Mutex::new(Vec::new())),
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Rate { .. } => MetricKind::Rate,
            Metric::Trend(_) => MetricKind::Trend,
        }
    }

    fn value(&self) -> MetricValue {
        match self {
            Metric::Counter(count) => MetricValue::Counter(count.load(Ordering::Relaxed)),
            Metric::Rate { passes, fails } => MetricValue::Rate {
                passes: passes.load(Ordering::Relaxed),
                fails: fails.load(Ordering::Relaxed),
            },
            Metric::Trend(samples) => MetricValue::Trend(TrendSamples::new(&samples.lock())),
        }
    }
}

/// Concurrent aggregation of every metric recorded during one run.
///
/// Writers share a read lock over the metric map and update atomics, or hold a trend's mutex just
/// long enough to push a sample. [MetricRegistry::snapshot] takes the write lock, which briefly
/// pauses all writers so that the snapshot is a consistent cut.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_counter(&self, name: &str, value: u64) -> Result<(), MetricKindError> {
        self.with_metric(name, MetricKind::Counter, |metric| {
            if let Metric::Counter(count) = metric {
                count.fetch_add(value, Ordering::Relaxed);
            }
        })
    }

    pub fn add_rate(&self, name: &str, observation: bool) -> Result<(), MetricKindError> {
        self.with_metric(name, MetricKind::Rate, |metric| {
            if let Metric::Rate { passes, fails } = metric {
                if observation {
                    passes.fetch_add(1, Ordering::Relaxed);
                } else {
                    fails.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }

    pub fn add_trend(&self, name: &str, value: Duration) -> Result<(), MetricKindError> {
        self.with_metric(name, MetricKind::Trend, |metric| {
            if let Metric::Trend(samples) = metric {
                samples.lock().push(value);
            }
        })
    }

    /// Record the outcome of one VU iteration into the built-in metrics.
    pub fn record_iteration(&self, record: &IterationRecord) -> Result<(), MetricKindError> {
        self.add_counter(builtin::ITERATIONS, 1)?;
        self.add_rate(builtin::ITERATION_SUCCESS, record.success)?;
        self.add_trend(builtin::ITERATION_DURATION, record.latency)?;
        Ok(())
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.read().get(name).map(Metric::kind)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Copy out the current value of every metric.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let metrics = self.metrics.write();

        MetricsSnapshot {
            metrics: metrics
                .iter()
                .map(|(name, metric)| (name.clone(), metric.value()))
                .collect(),
        }
    }

    fn with_metric<R>(
        &self,
        name: &str,
        kind: MetricKind,
        f: impl FnOnce(&Metric) -> R,
    ) -> Result<R, MetricKindError> {
        {
            let metrics = self.metrics.read();
            if let Some(metric) = metrics.get(name) {
                return check_kind(name, metric, kind).map(|_| f(metric));
            }
        }

        let mut metrics = self.metrics.write();
        let metric = metrics
            .entry(name.to_string())
            .or_insert_with(|| Metric::new(kind));
        check_kind(name, metric, kind).map(|_| f(metric))
    }
}

fn check_kind(name: &str, metric: &Metric, requested: MetricKind) -> Result<(), MetricKindError> {
    let registered = metric.kind();
    if registered != requested {
        return Err(MetricKindError {
            name: name.to_string(),
            registered,
            requested,
        });
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Rate { passes: u64, fails: u64 },
    Trend(TrendSamples),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Rate { .. } => MetricKind::Rate,
            MetricValue::Trend(_) => MetricKind::Trend,
        }
    }

    pub fn to_summary(&self) -> MetricSummary {
        match self {
            MetricValue::Counter(count) => MetricSummary::Counter { count: *count },
            MetricValue::Rate { passes, fails } => MetricSummary::Rate {
                passes: *passes,
                fails: *fails,
                rate: rate(*passes, *fails),
            },
            MetricValue::Trend(samples) => MetricSummary::Trend(samples.to_summary()),
        }
    }
}

/// The fraction of observations that were true, computed from the integer counts.
pub fn rate(passes: u64, fails: u64) -> f64 {
    let total = passes + fails;
    if total == 0 {
        return 0.0;
    }

    passes as f64 / total as f64
}

/// A point in time copy of a [MetricRegistry].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsSnapshot {
    metrics: BTreeMap<String, MetricValue>,
}

impl MetricsSnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricValue)> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn summaries(&self) -> BTreeMap<String, MetricSummary> {
        self.metrics
            .iter()
            .map(|(name, value)| (name.clone(), value.to_summary()))
            .collect()
    }
}

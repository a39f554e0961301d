use std::fmt::{Display, Formatter};
use std::time::Duration;

use surge_instruments::{rate, MetricValue, MetricsSnapshot};
use surge_summary_model::ThresholdResult;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("missing comparison operator in [{0}]")]
    MissingOperator(String),
    #[error("unknown aggregation [{0}], expected one of p(N), avg, min, med, max, count, rate")]
    UnknownAggregation(String),
    #[error("percentile must be between 0 and 100, got [{0}]")]
    InvalidPercentile(String),
    #[error("threshold value [{0}] is not a number")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Percentile(f64),
    Avg,
    Min,
    Med,
    Max,
    Count,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Comparison::Lt => observed < expected,
            Comparison::Le => observed <= expected,
            Comparison::Gt => observed > expected,
            Comparison::Ge => observed >= expected,
            Comparison::Eq => observed == expected,
            Comparison::Ne => observed != expected,
        }
    }
}

/// A pass/fail condition over one metric, written like `p(95)<500` or `rate>0.99`.
///
/// Trend values are compared in milliseconds. For counters, `rate` is the count per second of run
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    metric: String,
    expression: String,
    aggregation: Aggregation,
    comparison: Comparison,
    value: f64,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let compact = expression
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>();

        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;
        let (lhs, rest) = compact.split_at(op_start);

        let (comparison, rhs) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .into_iter()
        .find_map(|(op, comparison)| rest.strip_prefix(op).map(|rhs| (comparison, rhs)))
        .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;

        let value = rhs
            .parse::<f64>()
            .map_err(|_| ThresholdParseError::InvalidValue(rhs.to_string()))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: compact.clone(),
            aggregation: parse_aggregation(lhs)?,
            comparison,
            value,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Check the threshold against the final metrics. `elapsed` is the run time used for counter
    /// rates.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot, elapsed: Duration) -> ThresholdResult {
        let observed = snapshot
            .get(&self.metric)
            .and_then(|value| observe(value, self.aggregation, elapsed));

        let passed = match observed {
            Some(observed) => self.comparison.holds(observed, self.value),
            None => {
                log::warn!(
                    "Threshold [{}] on [{}] could not be evaluated, the metric is missing or does not support this aggregation",
                    self.expression,
                    self.metric
                );
                false
            }
        };

        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            passed,
        }
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression)
    }
}

fn parse_aggregation(lhs: &str) -> Result<Aggregation, ThresholdParseError> {
    if let Some(p) = lhs.strip_prefix("p(").and_then(|s| s.strip_suffix(')')) {
        let p = p
            .parse::<f64>()
            .map_err(|_| ThresholdParseError::InvalidPercentile(p.to_string()))?;
        if !(0.0..=100.0).contains(&p) {
            return Err(ThresholdParseError::InvalidPercentile(p.to_string()));
        }
        return Ok(Aggregation::Percentile(p));
    }

    match lhs {
        "avg" => Ok(Aggregation::Avg),
        "min" => Ok(Aggregation::Min),
        "med" => Ok(Aggregation::Med),
        "max" => Ok(Aggregation::Max),
        "count" => Ok(Aggregation::Count),
        "rate" => Ok(Aggregation::Rate),
        other => Err(ThresholdParseError::UnknownAggregation(other.to_string())),
    }
}

fn observe(value: &MetricValue, aggregation: Aggregation, elapsed: Duration) -> Option<f64> {
    match (value, aggregation) {
        (MetricValue::Counter(count), Aggregation::Count) => Some(*count as f64),
        (MetricValue::Counter(count), Aggregation::Rate) => {
            let secs = elapsed.as_secs_f64();
            Some(if secs > 0.0 { *count as f64 / secs } else { 0.0 })
        }
        (MetricValue::Rate { passes, fails }, Aggregation::Rate) => Some(rate(*passes, *fails)),
        (MetricValue::Rate { passes, fails }, Aggregation::Count) => Some((passes + fails) as f64),
        (MetricValue::Trend(samples), Aggregation::Percentile(p)) => Some(samples.percentile(p)),
        (MetricValue::Trend(samples), Aggregation::Avg) => Some(samples.avg()),
        (MetricValue::Trend(samples), Aggregation::Min) => Some(samples.min()),
        (MetricValue::Trend(samples), Aggregation::Med) => Some(samples.percentile(50.0)),
        (MetricValue::Trend(samples), Aggregation::Max) => Some(samples.max()),
        (MetricValue::Trend(samples), Aggregation::Count) => Some(samples.count() as f64),
        _ => None,
    }
}

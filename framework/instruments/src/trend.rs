use std::time::Duration;

use surge_summary_model::TrendSummary;

/// A sealed, sorted copy of the samples recorded for a trend.
///
/// Sorting on construction means every statistic is independent of the order in which the samples
/// were appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSamples {
    sorted_ms: Vec<f64>,
}

impl TrendSamples {
    pub fn new(samples: &[Duration]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        Self {
            sorted_ms: sorted.into_iter().map(duration_ms).collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.sorted_ms.len()
    }

    pub fn min(&self) -> f64 {
        self.sorted_ms.first().copied().unwrap_or_default()
    }

    pub fn max(&self) -> f64 {
        self.sorted_ms.last().copied().unwrap_or_default()
    }

    pub fn avg(&self) -> f64 {
        if self.sorted_ms.is_empty() {
            return 0.0;
        }

        self.sorted_ms.iter().sum::<f64>() / self.sorted_ms.len() as f64
    }

    /// The `p`th percentile, interpolating linearly between the closest ranks.
    ///
    /// `p` is clamped to `0..=100`.
    pub fn percentile(&self, p: f64) -> f64 {
        let n = self.sorted_ms.len();
        match n {
            0 => return 0.0,
            1 => return self.sorted_ms[0],
            _ => {}
        }

        let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;

        self.sorted_ms[lower] + (self.sorted_ms[upper] - self.sorted_ms[lower]) * weight
    }

    pub fn to_summary(&self) -> TrendSummary {
        TrendSummary {
            count: self.count() as u64,
            min: self.min(),
            max: self.max(),
            avg: self.avg(),
            med: self.percentile(50.0),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
        }
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[test]
    fn percentiles_interpolate_between_ranks() {
        let samples = TrendSamples::new(&ms(&[10, 20, 30, 40, 50]));

        assert_eq!(30.0, samples.percentile(50.0));
        assert_eq!(35.0, samples.percentile(62.5));
        assert_eq!(40.0, samples.percentile(75.0));
        assert_eq!(10.0, samples.percentile(0.0));
        assert_eq!(50.0, samples.percentile(100.0));
    }

    #[test]
    fn order_does_not_change_statistics() {
        let forward = ms(&[5, 1, 9, 3, 7, 2, 8]);
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(
            TrendSamples::new(&forward).to_summary(),
            TrendSamples::new(&reversed).to_summary()
        );
    }

    #[test]
    fn empty_trend_is_all_zero() {
        let summary = TrendSamples::new(&[]).to_summary();
        assert_eq!(0, summary.count);
        assert_eq!(0.0, summary.p99);
        assert_eq!(0.0, summary.avg);
    }

    #[test]
    fn single_sample() {
        let samples = TrendSamples::new(&ms(&[42]));
        assert_eq!(42.0, samples.percentile(95.0));
        assert_eq!(42.0, samples.avg());
    }
}

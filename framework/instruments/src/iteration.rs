use std::time::{Duration, Instant, SystemTime};

use crate::registry::{MetricKindError, MetricRegistry};

/// The outcome of one scenario iteration run by a VU.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub vu_id: usize,
    pub success: bool,
    pub latency: Duration,
    /// Wall clock time at which the iteration finished
    pub timestamp: SystemTime,
}

/// Times a single operation inside a scenario, such as one HTTP request.
///
/// Create the record just before the operation starts and pass the operation's result to
/// [OperationRecord::finish] to record it.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Record `<operation_id>s` (counter), `<operation_id>_duration` (trend) and
    /// `<operation_id>_failed` (rate), returning the elapsed time.
    pub fn finish<T, E>(
        self,
        registry: &MetricRegistry,
        response: &Result<T, E>,
    ) -> Result<Duration, MetricKindError> {
        let elapsed = self.started.elapsed();

        registry.add_counter(&format!("{}s", self.operation_id), 1)?;
        registry.add_trend(&format!("{}_duration", self.operation_id), elapsed)?;
        registry.add_rate(&format!("{}_failed", self.operation_id), response.is_err())?;

        log::trace!(
            "Operation {} took {}ms, and failed? {:?}",
            self.operation_id,
            elapsed.as_millis(),
            response.is_err(),
        );

        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricValue;

    #[test]
    fn finish_records_operation_metrics() {
        let registry = MetricRegistry::new();

        OperationRecord::new("http_req")
            .finish(&registry, &Ok::<(), ()>(()))
            .unwrap();
        OperationRecord::new("http_req")
            .finish(&registry, &Err::<(), _>("connection refused"))
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(Some(&MetricValue::Counter(2)), snapshot.get("http_reqs"));
        assert_eq!(
            Some(&MetricValue::Rate {
                passes: 1,
                fails: 1
            }),
            snapshot.get("http_req_failed")
        );
        assert!(matches!(
            snapshot.get("http_req_duration"),
            Some(MetricValue::Trend(samples)) if samples.count() == 2
        ));
    }
}

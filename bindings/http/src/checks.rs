use surge_instruments::{MetricKindError, MetricRegistry};

/// The rate metric that every check is recorded into.
pub const CHECKS: &str = "checks";

/// A named assertion about a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
}

impl Check {
    pub fn new(name: &'static str, passed: bool) -> Self {
        Self { name, passed }
    }
}

/// Record each check into the [CHECKS] rate. Returns true if every check passed.
pub fn record_checks(registry: &MetricRegistry, checks: &[Check]) -> Result<bool, MetricKindError> {
    let mut all_passed = true;
    for check in checks {
        registry.add_rate(CHECKS, check.passed)?;
        if !check.passed {
            log::debug!("Check failed: {}", check.name);
            all_passed = false;
        }
    }

    Ok(all_passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_instruments::MetricValue;

    #[test]
    fn every_check_is_recorded() {
        let registry = MetricRegistry::new();

        let passed = record_checks(
            &registry,
            &[
                Check::new("status is 200", true),
                Check::new("body matches", false),
                Check::new("content-type matches", true),
            ],
        )
        .unwrap();

        assert!(!passed);
        match registry.snapshot().get(CHECKS) {
            Some(MetricValue::Rate { passes, fails }) => {
                assert_eq!(2, *passes);
                assert_eq!(1, *fails);
            }
            other => panic!("unexpected metric {other:?}"),
        }
    }

    #[test]
    fn no_checks_pass_trivially() {
        let registry = MetricRegistry::new();

        assert!(record_checks(&registry, &[]).unwrap());
        assert!(registry.is_empty());
    }
}

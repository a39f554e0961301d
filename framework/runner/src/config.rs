use std::time::Duration;

use surge_core::prelude::{ConfigError, RampProfile};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_VUS: usize = 10_000;

/// Everything the executor needs to schedule a run. Fixed once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub base_url: String,
    pub profile: RampProfile,
    /// How often the target VU count is recomputed
    pub tick_interval: Duration,
    /// How long a VU told to stop may keep running its current iteration
    pub graceful_ramp_down: Duration,
    /// Hard ceiling on VU tasks alive at once, including those still draining
    pub max_vus: usize,
}

impl RunConfig {
    pub fn new(profile: RampProfile) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile,
            tick_interval: DEFAULT_TICK_INTERVAL,
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
            max_vus: DEFAULT_MAX_VUS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_graceful_ramp_down(mut self, graceful_ramp_down: Duration) -> Self {
        self.graceful_ramp_down = graceful_ramp_down;
        self
    }

    pub fn with_max_vus(mut self, max_vus: usize) -> Self {
        self.max_vus = max_vus;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile.validate()?;

        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }

        if self.max_vus == 0 {
            return Err(ConfigError::ZeroMaxVus);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::prelude::Stage;

    fn profile() -> RampProfile {
        RampProfile::new(vec![Stage::new(Duration::from_secs(1), 1)])
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Ok(()), RunConfig::new(profile()).validate());
    }

    #[test]
    fn reject_zero_tick() {
        let config = RunConfig::new(profile()).with_tick_interval(Duration::ZERO);
        assert_eq!(Err(ConfigError::ZeroTickInterval), config.validate());
    }

    #[test]
    fn reject_zero_ceiling() {
        let config = RunConfig::new(profile()).with_max_vus(0);
        assert_eq!(Err(ConfigError::ZeroMaxVus), config.validate());
    }

    #[test]
    fn profile_errors_surface() {
        let config = RunConfig::new(RampProfile::new(vec![]));
        assert_eq!(Err(ConfigError::EmptyProfile), config.validate());
    }
}

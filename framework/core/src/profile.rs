use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reach `target` VUs by the end of `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Parses `<duration>:<target>`, for example `10s:50` or `1m30s:0`.
impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidStage {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (duration, target) = s
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected <duration>:<target>"))?;

        let duration = humantime_serde::re::humantime::parse_duration(duration.trim())
            .map_err(|e| invalid(&e.to_string()))?;
        let target = target
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(&format!("target must be a non-negative integer, {e}")))?;

        Ok(Stage { duration, target })
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            humantime_serde::re::humantime::format_duration(self.duration),
            self.target
        )
    }
}

/// How the target moves between the end of one stage and the end of the next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Move linearly from the previous target, rounding down.
    #[default]
    Linear,
    /// Jump to the stage target as soon as the stage begins.
    Step,
}

impl FromStr for Interpolation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Interpolation::Linear),
            "step" => Ok(Interpolation::Step),
            other => Err(ConfigError::InvalidInterpolation {
                input: other.to_string(),
            }),
        }
    }
}

/// An ordered list of stages describing the desired VU count over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampProfile {
    #[serde(default)]
    pub start_vus: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
    pub stages: Vec<Stage>,
}

impl RampProfile {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            start_vus: 0,
            interpolation: Interpolation::default(),
            stages,
        }
    }

    pub fn with_start_vus(mut self, start_vus: usize) -> Self {
        self.start_vus = start_vus;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Reject profiles that cannot be scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyProfile);
        }

        if let Some(index) = self.stages.iter().position(|s| s.duration.is_zero()) {
            return Err(ConfigError::ZeroDurationStage { index });
        }

        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// The highest VU count the profile asks for at any point.
    pub fn peak_target(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .chain(std::iter::once(self.start_vus))
            .max()
            .unwrap_or_default()
    }
}

use std::time::Duration;

use clap::ValueEnum;
use surge_core::prelude::{RampProfile, Stage};

/// Ramp profiles used by the benchmark suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfilePreset {
    /// Ramp to the requested concurrency, hold it, then ramp down.
    Concurrency,
    /// Baseline load with two sudden spikes to 10000 VUs.
    Spike,
    /// Short primer and warmup, then 15 second steps through 16 to 512 VUs.
    Tfb,
}

pub const TFB_CONCURRENCY_LEVELS: [usize; 6] = [16, 32, 64, 128, 256, 512];

impl ProfilePreset {
    pub fn name(&self) -> &'static str {
        match self {
            ProfilePreset::Concurrency => "concurrency",
            ProfilePreset::Spike => "spike",
            ProfilePreset::Tfb => "tfb",
        }
    }

    /// Build the profile. Only the concurrency preset uses `concurrency`.
    pub fn profile(&self, concurrency: usize) -> RampProfile {
        match self {
            ProfilePreset::Concurrency => RampProfile::new(vec![
                Stage::new(secs(10), concurrency),
                Stage::new(secs(30), concurrency),
                Stage::new(secs(5), 0),
            ])
            .with_start_vus(1),
            ProfilePreset::Spike => {
                let spike = [
                    Stage::new(secs(10), 10_000),
                    Stage::new(secs(10), 10_000),
                    Stage::new(secs(5), 100),
                    Stage::new(secs(10), 100),
                ];

                let mut stages = vec![Stage::new(secs(10), 100), Stage::new(secs(10), 100)];
                stages.extend(spike);
                stages.extend(spike);
                RampProfile::new(stages)
            }
            ProfilePreset::Tfb => {
                let mut stages = vec![Stage::new(secs(5), 8), Stage::new(secs(5), 512)];
                stages.extend(
                    TFB_CONCURRENCY_LEVELS
                        .iter()
                        .map(|level| Stage::new(secs(15), *level)),
                );
                RampProfile::new(stages)
            }
        }
    }
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_preset() {
        let profile = ProfilePreset::Concurrency.profile(64);

        assert_eq!(1, profile.start_vus);
        assert_eq!(Duration::from_secs(45), profile.total_duration());
        assert_eq!(64, profile.peak_target());
        assert_eq!(0, profile.stages.last().unwrap().target);
    }

    #[test]
    fn spike_preset() {
        let profile = ProfilePreset::Spike.profile(1);

        assert_eq!(10, profile.stages.len());
        assert_eq!(Duration::from_secs(90), profile.total_duration());
        assert_eq!(10_000, profile.peak_target());
    }

    #[test]
    fn tfb_preset() {
        let profile = ProfilePreset::Tfb.profile(1);

        assert_eq!(8, profile.stages.len());
        assert_eq!(Duration::from_secs(100), profile.total_duration());
        assert_eq!(512, profile.stages.last().unwrap().target);
        assert!(profile.validate().is_ok());
    }
}

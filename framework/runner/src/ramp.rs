use std::time::Duration;

use surge_core::prelude::{Interpolation, RampProfile};

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Duration,
    end: Duration,
    from: usize,
    to: usize,
}

/// Computes the target VU count at any point in a run from its ramp profile.
///
/// Each stage's target is the value to reach by the end of that stage, moving from the end value of
/// the previous stage (or the profile's start VUs for the first stage). All arithmetic is done on
/// integer nanoseconds so the same inputs always give the same target.
#[derive(Debug, Clone)]
pub struct RampScheduler {
    start_vus: usize,
    interpolation: Interpolation,
    segments: Vec<Segment>,
    total: Duration,
}

impl RampScheduler {
    /// The profile must already have been validated.
    pub fn new(profile: &RampProfile) -> Self {
        let mut segments = Vec::with_capacity(profile.stages.len());
        let mut start = Duration::ZERO;
        let mut from = profile.start_vus;

        for stage in &profile.stages {
            let end = start + stage.duration;
            segments.push(Segment {
                start,
                end,
                from,
                to: stage.target,
            });
            start = end;
            from = stage.target;
        }

        Self {
            start_vus: profile.start_vus,
            interpolation: profile.interpolation,
            segments,
            total: start,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// The target once the profile has completed.
    pub fn final_target(&self) -> usize {
        self.segments
            .last()
            .map(|s| s.to)
            .unwrap_or(self.start_vus)
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    pub fn target_at(&self, elapsed: Duration) -> usize {
        let Some(segment) = self
            .segments
            .iter()
            .find(|s| elapsed >= s.start && elapsed < s.end)
        else {
            // Stages cover the whole run from zero, so this is past the end.
            return self.final_target();
        };

        match self.interpolation {
            Interpolation::Step => segment.to,
            Interpolation::Linear => interpolate(segment, elapsed),
        }
    }
}

fn interpolate(segment: &Segment, elapsed: Duration) -> usize {
    let progress = (elapsed - segment.start).as_nanos() as i128;
    let length = (segment.end - segment.start).as_nanos() as i128;
    let delta = segment.to as i128 - segment.from as i128;

    // Floor division, including when ramping down.
    let offset = (delta * progress).div_euclid(length);

    (segment.from as i128 + offset) as usize
}

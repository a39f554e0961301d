use std::time::{Duration, SystemTime};

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// The time source for a single run.
///
/// Elapsed time is measured on the tokio clock so that a paused test runtime drives the run
/// deterministically. The wall clock start is kept for reporting.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started: Instant,
    started_at: SystemTime,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: SystemTime::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Seconds since the Unix epoch at which the run started.
    pub fn started_at_unix(&self) -> i64 {
        self.started_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    pub fn ticker(&self, period: Duration) -> Ticker {
        Ticker::new(*self, period)
    }
}

/// Fires every `period` and reports the elapsed run time at each tick.
///
/// The first tick completes immediately. Ticks that were missed because the driver was busy are
/// skipped rather than delivered in a burst.
#[derive(Debug)]
pub struct Ticker {
    clock: RunClock,
    interval: Interval,
}

impl Ticker {
    fn new(clock: RunClock, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(clock.started(), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self { clock, interval }
    }

    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        self.clock.elapsed()
    }

    pub fn clock(&self) -> &RunClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_on_period_boundaries() {
        let clock = RunClock::start();
        let mut ticker = clock.ticker(Duration::from_secs(1));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(ticker.tick().await);
        }

        assert_eq!(
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ],
            seen
        );
    }

    #[tokio::test(start_paused = true)]
    async fn skips_missed_ticks() {
        let clock = RunClock::start();
        let mut ticker = clock.ticker(Duration::from_secs(1));
        ticker.tick().await;

        tokio::time::sleep(Duration::from_millis(3500)).await;

        // The overdue tick fires straight away, then the schedule realigns to the period.
        let late = ticker.tick().await;
        assert_eq!(Duration::from_millis(3500), late);
        let next = ticker.tick().await;
        assert_eq!(Duration::from_secs(4), next);
    }
}

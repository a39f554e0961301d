use std::sync::Arc;

use surge_core::prelude::{ConfigError, RunClock};
use surge_instruments::MetricsSnapshot;
use surge_summary_model::{RunSummary, StageSummary, VuSample};
use tokio::time::Instant;

use crate::config::RunConfig;
use crate::context::{RunnerContext, UserValuesConstraint};
use crate::definition::VuHooks;
use crate::pool::VuPool;
use crate::ramp::RampScheduler;

/// The outcome of [Executor::run].
#[derive(Debug)]
pub struct RunReport {
    /// Run metadata and metric summaries. Thresholds are not evaluated yet.
    pub summary: RunSummary,
    /// The final metric values, for evaluating thresholds.
    pub snapshot: MetricsSnapshot,
}

/// Drives one run: ticks the ramp schedule, scales the VU pool to match, drains it and summarises
/// the metrics.
pub struct Executor<RV: UserValuesConstraint, V: UserValuesConstraint> {
    config: RunConfig,
    runner_context: Arc<RunnerContext<RV>>,
    hooks: VuHooks<RV, V>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Executor<RV, V> {
    pub fn new(
        config: RunConfig,
        runner_context: Arc<RunnerContext<RV>>,
        hooks: VuHooks<RV, V>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            runner_context,
            hooks,
        })
    }

    /// Run the profile to completion, or until the run's shutdown handle is triggered. A run that is
    /// shut down early is still drained and summarised, with `partial` set.
    pub async fn run(
        self,
        scenario_name: &str,
        profile_name: Option<&str>,
    ) -> anyhow::Result<RunReport> {
        let scheduler = RampScheduler::new(&self.config.profile);
        let clock = RunClock::start();
        let mut ticker = clock.ticker(self.config.tick_interval);
        let mut shutdown_listener = self.runner_context.new_shutdown_listener();
        let end = clock.started() + scheduler.total_duration();

        let mut pool = VuPool::new(
            self.runner_context.clone(),
            self.hooks,
            self.config.max_vus,
            self.config.graceful_ramp_down,
        );

        log::info!(
            "Starting run {} of [{scenario_name}] with {} stages over {:?}",
            self.runner_context.run_id(),
            self.config.profile.stages.len(),
            scheduler.total_duration()
        );

        let mut timeline = Vec::new();
        let mut peak_vus = 0;
        let mut partial = false;

        loop {
            let grace_deadline = pool.next_grace_deadline();
            let elapsed = tokio::select! {
                biased;
                _ = shutdown_listener.wait_for_shutdown() => {
                    log::info!("Shutdown requested after {:?}, stopping all VUs", clock.elapsed());
                    partial = true;
                    break;
                }
                _ = sleep_until_deadline(grace_deadline) => {
                    pool.enforce_grace(Instant::now()).await?;
                    continue;
                }
                elapsed = ticker.tick() => elapsed,
                _ = tokio::time::sleep_until(end) => clock.elapsed(),
            };

            pool.reap().await?;
            pool.enforce_grace(Instant::now()).await?;

            let complete = scheduler.is_complete(elapsed);
            let target = if complete {
                scheduler.final_target()
            } else {
                scheduler.target_at(elapsed)
            }
            .min(self.config.max_vus);

            pool.scale_to(target, Instant::now());

            let active = pool.active_count();
            peak_vus = peak_vus.max(active);
            self.runner_context.set_active_vus(active);
            timeline.push(VuSample {
                elapsed_ms: elapsed.as_millis() as u64,
                target,
                active,
            });
            log::debug!("Tick at {elapsed:?}: target {target}, active {active}");

            if complete {
                log::info!("Ramp profile complete after {elapsed:?}");
                break;
            }
        }

        let final_vus = pool.active_count();
        pool.drain(Instant::now()).await?;
        self.runner_context.set_active_vus(0);

        let elapsed = clock.elapsed();
        let snapshot = self.runner_context.registry().snapshot();

        let stages = self
            .config
            .profile
            .stages
            .iter()
            .map(|s| StageSummary {
                duration_ms: s.duration.as_millis() as u64,
                target: s.target,
            })
            .collect();

        let mut summary = RunSummary::new(
            self.runner_context.run_id().to_string(),
            scenario_name.to_string(),
            clock.started_at_unix(),
            stages,
            self.config.max_vus,
            env!("CARGO_PKG_VERSION").to_string(),
        );
        summary.profile_name = profile_name.map(ToString::to_string);
        summary.start_vus = self.config.profile.start_vus;
        summary.elapsed_ms = elapsed.as_millis() as u64;
        summary.partial = partial;
        summary.final_vus = final_vus;
        summary.peak_vus = peak_vus;
        summary.interrupted_iterations = pool.interrupted_iterations();
        summary.timeline = timeline;
        summary.metrics = snapshot.summaries();
        summary.add_env(
            "BASE_URL".to_string(),
            self.runner_context.base_url().to_string(),
        );
        summary.add_env(
            "TICK_INTERVAL".to_string(),
            format!("{:?}", self.config.tick_interval),
        );
        summary.add_env(
            "GRACEFUL_RAMP_DOWN".to_string(),
            format!("{:?}", self.config.graceful_ramp_down),
        );

        log::info!(
            "Run {} finished after {elapsed:?}{}",
            summary.run_id,
            if partial { " (partial)" } else { "" }
        );

        Ok(RunReport { summary, snapshot })
    }
}

/// Never completes without a deadline.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

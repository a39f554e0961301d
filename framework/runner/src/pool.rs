use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use surge_core::prelude::EngineFault;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::definition::VuHooks;
use crate::vu::{run_vu, VuState};

struct VuHandle {
    id: usize,
    state: Arc<VuState>,
    task: JoinHandle<()>,
    stop_requested_at: Option<Instant>,
}

/// The VUs of one run. Only the executor's driver task touches the membership lists.
pub(crate) struct VuPool<RV: UserValuesConstraint, V: UserValuesConstraint> {
    runner_context: Arc<RunnerContext<RV>>,
    hooks: VuHooks<RV, V>,
    /// Running VUs, oldest first
    active: VecDeque<VuHandle>,
    /// VUs that have been told to stop but have not exited yet
    stopping: Vec<VuHandle>,
    next_id: usize,
    max_vus: usize,
    graceful_ramp_down: Duration,
    interrupted: Arc<AtomicU64>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuPool<RV, V> {
    pub(crate) fn new(
        runner_context: Arc<RunnerContext<RV>>,
        hooks: VuHooks<RV, V>,
        max_vus: usize,
        graceful_ramp_down: Duration,
    ) -> Self {
        Self {
            runner_context,
            hooks,
            active: VecDeque::new(),
            stopping: Vec::new(),
            next_id: 1,
            max_vus,
            graceful_ramp_down,
            interrupted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active plus stopping VUs, every VU task that may still be running.
    pub(crate) fn live_count(&self) -> usize {
        self.active.len() + self.stopping.len()
    }

    /// Iterations discarded because their VU was force-stopped or cancelled by shutdown.
    pub(crate) fn interrupted_iterations(&self) -> u64 {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Start or retire VUs so that `target` are active. The oldest VUs are retired first. New VUs
    /// are only started while the live count stays within `max_vus`.
    pub(crate) fn scale_to(&mut self, target: usize, now: Instant) {
        let active = self.active.len();

        if target > active {
            let wanted = target - active;
            let room = self.max_vus.saturating_sub(self.live_count());
            let spawn = wanted.min(room);
            if spawn < wanted {
                log::debug!(
                    "VU ceiling of {} reached with {} stopping, starting {spawn} of {wanted} VUs",
                    self.max_vus,
                    self.stopping.len()
                );
            }

            for _ in 0..spawn {
                self.spawn();
            }
        } else {
            for _ in target..active {
                let Some(mut handle) = self.active.pop_front() else {
                    break;
                };
                if handle.state.request_stop() {
                    log::debug!("Retiring VU {}", handle.id);
                }
                handle.stop_requested_at = Some(now);
                self.stopping.push(handle);
            }
        }
    }

    fn spawn(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let state = Arc::new(VuState::new());
        let ctx = VuContext::new(
            id,
            self.runner_context.clone(),
            self.runner_context.new_shutdown_listener(),
        );
        let task = tokio::spawn(run_vu(
            ctx,
            self.hooks,
            state.clone(),
            self.interrupted.clone(),
        ));

        log::trace!("Started VU {id}");
        self.active.push_back(VuHandle {
            id,
            state,
            task,
            stop_requested_at: None,
        });
    }

    /// Remove VUs whose tasks have exited. A VU task that panicked outside the behaviour is an
    /// engine fault.
    pub(crate) async fn reap(&mut self) -> Result<(), EngineFault> {
        let (finished, stopping): (Vec<_>, Vec<_>) = std::mem::take(&mut self.stopping)
            .into_iter()
            .partition(|h| h.task.is_finished());
        self.stopping = stopping;
        for handle in finished {
            join(handle).await?;
        }

        let (exited, active): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|h| h.task.is_finished());
        self.active = active;
        for handle in exited {
            log::debug!("VU {} exited on its own", handle.id);
            join(handle).await?;
        }

        Ok(())
    }

    /// Force-stop VUs that have been stopping for longer than the graceful ramp-down period.
    pub(crate) async fn enforce_grace(&mut self, now: Instant) -> Result<(), EngineFault> {
        let grace = self.graceful_ramp_down;
        let (overdue, stopping): (Vec<_>, Vec<_>) = std::mem::take(&mut self.stopping)
            .into_iter()
            .partition(|h| h.stop_requested_at.is_some_and(|at| at + grace <= now));
        self.stopping = stopping;

        for handle in overdue {
            self.force_stop(handle).await?;
        }

        Ok(())
    }

    /// Stop every VU and wait for them, force-stopping any that outlive the graceful ramp-down
    /// period.
    pub(crate) async fn drain(&mut self, now: Instant) -> Result<(), EngineFault> {
        let active = self.active.len();
        self.scale_to(0, now);
        log::info!(
            "Stopping {active} active VUs, {} VUs draining in total",
            self.stopping.len()
        );

        for mut handle in std::mem::take(&mut self.stopping) {
            let deadline = handle.stop_requested_at.unwrap_or(now) + self.graceful_ramp_down;
            match tokio::time::timeout_at(deadline, &mut handle.task).await {
                Ok(result) => check_join(handle.id, result)?,
                Err(_) => self.force_stop(handle).await?,
            }
        }

        Ok(())
    }

    async fn force_stop(&self, handle: VuHandle) -> Result<(), EngineFault> {
        handle.task.abort();

        if handle.state.mark_stopped() {
            if handle.state.claim_iteration() {
                self.interrupted.fetch_add(1, Ordering::AcqRel);
            }
            log::warn!(
                "VU {} did not stop within the graceful ramp-down period of {:?}, force stopped",
                handle.id,
                self.graceful_ramp_down
            );
        }

        join(handle).await
    }

    /// When the longest-stopping VU runs out of graceful ramp-down time, if any VU is stopping.
    pub(crate) fn next_grace_deadline(&self) -> Option<Instant> {
        self.stopping
            .iter()
            .filter_map(|h| h.stop_requested_at)
            .min()
            .map(|at| at + self.graceful_ramp_down)
    }

    #[cfg(test)]
    fn states(&self) -> Vec<Arc<VuState>> {
        self.active
            .iter()
            .chain(self.stopping.iter())
            .map(|h| h.state.clone())
            .collect()
    }

    #[cfg(test)]
    fn active_ids(&self) -> Vec<usize> {
        self.active.iter().map(|h| h.id).collect()
    }

    #[cfg(test)]
    fn stopping_ids(&self) -> Vec<usize> {
        self.stopping.iter().map(|h| h.id).collect()
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Drop for VuPool<RV, V> {
    fn drop(&mut self) {
        // Only non-empty if the run is abandoned before the pool was drained.
        for handle in self.active.iter().chain(self.stopping.iter()) {
            handle.task.abort();
        }
    }
}

async fn join(handle: VuHandle) -> Result<(), EngineFault> {
    let result = handle.task.await;
    check_join(handle.id, result)
}

fn check_join(id: usize, result: Result<(), JoinError>) -> Result<(), EngineFault> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(EngineFault::new(format!("VU {id} task failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{BehaviourFuture, VuHookMut};
    use pretty_assertions::assert_eq;
    use surge_core::prelude::ShutdownHandle;
    use surge_instruments::MetricRegistry;

    #[derive(Debug, Default)]
    struct Values;

    impl UserValuesConstraint for Values {}

    fn sleepy(_ctx: &mut VuContext<Values, Values>) -> BehaviourFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
    }

    fn quick(_ctx: &mut VuContext<Values, Values>) -> BehaviourFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
    }

    fn pool(behaviour: VuHookMut<Values, Values>, max_vus: usize) -> VuPool<Values, Values> {
        let runner_context = Arc::new(RunnerContext::new(
            "test".to_string(),
            "http://localhost".to_string(),
            Arc::new(MetricRegistry::new()),
            ShutdownHandle::new(),
        ));

        VuPool::new(
            runner_context,
            VuHooks::new(behaviour),
            max_vus,
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retire_oldest_first() {
        let mut pool = pool(quick, 10);

        pool.scale_to(3, Instant::now());
        assert_eq!(vec![1, 2, 3], pool.active_ids());

        pool.scale_to(1, Instant::now());
        assert_eq!(vec![3], pool.active_ids());
        assert_eq!(vec![1, 2], pool.stopping_ids());

        pool.scale_to(2, Instant::now());
        assert_eq!(vec![3, 4], pool.active_ids());

        pool.drain(Instant::now()).await.unwrap();
        assert_eq!(0, pool.live_count());
        assert_eq!(0, pool.interrupted_iterations());
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_vus_count_towards_ceiling() {
        let mut pool = pool(sleepy, 3);

        pool.scale_to(3, Instant::now());
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.scale_to(0, Instant::now());
        pool.scale_to(3, Instant::now());

        assert_eq!(0, pool.active_count());
        assert_eq!(3, pool.live_count());

        pool.drain(Instant::now()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn force_stop_after_grace() {
        let mut pool = pool(sleepy, 10);

        pool.scale_to(2, Instant::now());
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.scale_to(0, Instant::now());

        tokio::time::sleep(Duration::from_millis(500)).await;
        pool.enforce_grace(Instant::now()).await.unwrap();
        assert_eq!(2, pool.live_count());

        tokio::time::sleep(Duration::from_millis(600)).await;
        pool.enforce_grace(Instant::now()).await.unwrap();
        assert_eq!(0, pool.live_count());
        assert_eq!(2, pool.interrupted_iterations());
    }

    #[tokio::test(start_paused = true)]
    async fn grace_deadline_follows_oldest_stop() {
        let mut pool = pool(sleepy, 10);
        assert_eq!(None, pool.next_grace_deadline());

        pool.scale_to(2, Instant::now());
        let first_stop = Instant::now();
        pool.scale_to(1, first_stop);
        tokio::time::sleep(Duration::from_millis(300)).await;
        pool.scale_to(0, Instant::now());

        assert_eq!(
            Some(first_stop + Duration::from_secs(1)),
            pool.next_grace_deadline()
        );

        pool.drain(Instant::now()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_pool_cancels_vus() {
        let mut pool = pool(sleepy, 10);

        pool.scale_to(2, Instant::now());
        pool.scale_to(1, Instant::now());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let states = pool.states();
        assert_eq!(2, states.len());

        drop(pool);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Each aborted task released its handle on the shared state.
        for state in states {
            assert_eq!(1, Arc::strong_count(&state));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reap_finished_vus() {
        let mut pool = pool(quick, 10);

        pool.scale_to(2, Instant::now());
        pool.scale_to(0, Instant::now());
        tokio::time::sleep(Duration::from_millis(200)).await;

        pool.reap().await.unwrap();
        assert_eq!(0, pool.live_count());
        assert_eq!(0, pool.interrupted_iterations());
    }
}

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use surge_core::prelude::ShutdownSignalError;
use surge_instruments::IterationRecord;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::context::{UserValuesConstraint, VuContext};
use crate::definition::{HookResult, VuHookMut, VuHooks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub(crate) enum VuStatus {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl From<u8> for VuStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => VuStatus::Idle,
            1 => VuStatus::Running,
            2 => VuStatus::Stopping,
            _ => VuStatus::Stopped,
        }
    }
}

/// Shared between a VU task and the pool that owns it.
#[derive(Debug)]
pub(crate) struct VuState {
    status: AtomicU8,
    stop: Notify,
    in_iteration: AtomicBool,
}

impl VuState {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU8::new(VuStatus::Idle as u8),
            stop: Notify::new(),
            in_iteration: AtomicBool::new(false),
        }
    }

    pub(crate) fn status(&self) -> VuStatus {
        self.status.load(Ordering::Acquire).into()
    }

    fn transition(&self, from: VuStatus, to: VuStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Ask the VU to stop after its current iteration. Returns true only for the call that moved
    /// the VU into [VuStatus::Stopping].
    pub(crate) fn request_stop(&self) -> bool {
        let stopped = self.transition(VuStatus::Running, VuStatus::Stopping)
            || self.transition(VuStatus::Idle, VuStatus::Stopping);
        if stopped {
            self.stop.notify_one();
        }
        stopped
    }

    /// Move to [VuStatus::Stopped] from any other status. Returns false if the VU was already
    /// stopped, so it is never counted twice.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.status.swap(VuStatus::Stopped as u8, Ordering::AcqRel) != VuStatus::Stopped as u8
    }

    fn begin_iteration(&self) {
        self.in_iteration.store(true, Ordering::Release);
    }

    /// Take ownership of the current iteration's result. Exactly one caller wins, either the VU
    /// recording it or the pool discarding it on a force stop.
    pub(crate) fn claim_iteration(&self) -> bool {
        self.in_iteration
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn should_stop(&self) -> bool {
        self.status() >= VuStatus::Stopping
    }
}

/// Run one VU until it is told to stop.
///
/// Errors and panics from the behaviour are recorded as failed iterations. Iterations cancelled
/// by the shutdown signal are counted in `interrupted` and not recorded.
pub(crate) async fn run_vu<RV: UserValuesConstraint, V: UserValuesConstraint>(
    mut ctx: VuContext<RV, V>,
    hooks: VuHooks<RV, V>,
    state: Arc<VuState>,
    interrupted: Arc<AtomicU64>,
) {
    let vu_id = ctx.vu_id();
    let registry = ctx.runner_context().registry().clone();

    if let Some(setup) = hooks.setup {
        if let Err(e) = run_hook(setup, &mut ctx).await {
            log::error!("VU setup failed for VU {vu_id}: {e:?}");
            state.mark_stopped();
            return;
        }
    }

    if !state.transition(VuStatus::Idle, VuStatus::Running) {
        log::debug!("VU {vu_id} was told to stop before it started");
    }

    match hooks.behaviour {
        Some(behaviour) => loop {
            if state.should_stop() {
                break;
            }
            if ctx.shutdown_listener().should_shutdown() {
                state.request_stop();
                break;
            }

            state.begin_iteration();
            let started = Instant::now();
            let outcome = AssertUnwindSafe(async { behaviour(&mut ctx).await })
                .catch_unwind()
                .await;
            let latency = started.elapsed();
            if !state.claim_iteration() {
                // Force-stopped while the behaviour was finishing, the pool owns this result.
                break;
            }

            let success = match outcome {
                Ok(Ok(())) => true,
                Ok(Err(e)) if e.is::<ShutdownSignalError>() => {
                    log::debug!("VU {vu_id} iteration cancelled by shutdown");
                    interrupted.fetch_add(1, Ordering::AcqRel);
                    state.request_stop();
                    break;
                }
                Ok(Err(e)) => {
                    log::debug!("VU {vu_id} iteration failed: {e:?}");
                    false
                }
                Err(panic) => {
                    log::error!(
                        "VU {vu_id} behaviour panicked: {}",
                        panic_message(panic.as_ref())
                    );
                    false
                }
            };

            let record = IterationRecord {
                vu_id,
                success,
                latency,
                timestamp: SystemTime::now(),
            };
            if let Err(e) = registry.record_iteration(&record) {
                log::error!("Failed to record iteration for VU {vu_id}: {e}");
            }

            ctx.next_iteration();
            tokio::task::yield_now().await;
        },
        None => state.stop.notified().await,
    }

    log::trace!("VU {vu_id} stopping after {} iterations", ctx.iteration());

    if let Some(teardown) = hooks.teardown {
        if let Err(e) = run_hook(teardown, &mut ctx).await {
            log::error!("VU teardown failed for VU {vu_id}: {e:?}");
        }
    }

    state.mark_stopped();
}

async fn run_hook<RV: UserValuesConstraint, V: UserValuesConstraint>(
    hook: VuHookMut<RV, V>,
    ctx: &mut VuContext<RV, V>,
) -> HookResult {
    match AssertUnwindSafe(async { hook(ctx).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(
            "Hook panicked: {}",
            panic_message(panic.as_ref())
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_requested_once() {
        let state = VuState::new();
        assert!(state.transition(VuStatus::Idle, VuStatus::Running));

        assert!(state.request_stop());
        assert!(!state.request_stop());
        assert_eq!(VuStatus::Stopping, state.status());
    }

    #[test]
    fn idle_vu_can_be_stopped() {
        let state = VuState::new();

        assert!(state.request_stop());
        assert_eq!(VuStatus::Stopping, state.status());
    }

    #[test]
    fn stopped_is_counted_once() {
        let state = VuState::new();
        state.request_stop();

        assert!(state.mark_stopped());
        assert!(!state.mark_stopped());
        assert!(!state.request_stop());
        assert_eq!(VuStatus::Stopped, state.status());
    }

    #[test]
    fn iteration_result_is_claimed_once() {
        let state = VuState::new();
        assert!(!state.claim_iteration());

        state.begin_iteration();
        assert!(state.claim_iteration());
        assert!(!state.claim_iteration());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!("static message", panic_message(payload.as_ref()));

        let payload: Box<dyn Any + Send> = Box::new(format!("formatted {}", 1));
        assert_eq!("formatted 1", panic_message(payload.as_ref()));
    }
}

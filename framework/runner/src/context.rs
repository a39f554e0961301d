use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use surge_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use surge_instruments::MetricRegistry;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by every VU in a run.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    run_id: String,
    base_url: String,
    registry: Arc<MetricRegistry>,
    shutdown_handle: ShutdownHandle,
    active_vus: AtomicUsize,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub fn new(
        run_id: String,
        base_url: String,
        registry: Arc<MetricRegistry>,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            run_id,
            base_url,
            registry,
            shutdown_handle,
            active_vus: AtomicUsize::new(0),
            value: Default::default(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The base URL of the service under test, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// The metric registry for this run. Scenarios record their own metrics here.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// The number of VUs that were active after the most recent scheduling tick.
    pub fn active_vus(&self) -> usize {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub(crate) fn set_active_vus(&self, active: usize) {
        self.active_vus.store(active, Ordering::Relaxed);
    }

    pub fn new_shutdown_listener(&self) -> DelegatedShutdownListener {
        self.shutdown_handle.new_listener()
    }

    /// Cancel the run from inside a hook. The run stops like it would on Ctrl-C and its summary is
    /// marked as partial.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// State owned by a single VU for its whole life.
pub struct VuContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    vu_id: usize,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuContext<RV, V> {
    pub(crate) fn new(
        vu_id: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            vu_id,
            iteration: 0,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// Unique within the run. VUs are numbered from 1 in the order they were started.
    pub fn vu_id(&self) -> usize {
        self.vu_id
    }

    /// The number of iterations this VU has completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// Listen for the run being cancelled. Long waits inside a behaviour should race against this
    /// and return [surge_core::prelude::ShutdownSignalError] when it fires.
    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}

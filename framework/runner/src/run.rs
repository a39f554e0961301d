use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use surge_instruments::{print_run_summary, MetricRegistry};
use surge_summary_model::{append_run_summary, write_run_summary, RunSummary};

use crate::context::{RunnerContext, UserValuesConstraint};
use crate::definition::ScenarioDefinitionBuilder;
use crate::executor::Executor;
use crate::monitor::start_monitor;
use crate::naming::NamingContext;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// One or more thresholds failed. The run itself completed and its summary was written.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{failed} of {total} thresholds failed for run {run_id}")]
pub struct ThresholdFailure {
    pub run_id: String,
    pub failed: usize,
    pub total: usize,
}

/// Run a scenario to completion and return its summary.
///
/// Fails if the definition is invalid, the global setup hook fails, the engine faults or any
/// threshold fails.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);

    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let registry = Arc::new(MetricRegistry::new());
    let mut runner_context = RunnerContext::new(
        run_id,
        definition.config.base_url.clone(),
        registry,
        shutdown_handle.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);

    if !definition.no_progress {
        let progress_context = runner_context.clone();
        start_progress(
            definition.config.profile.total_duration(),
            move || progress_context.active_vus(),
            shutdown_handle.new_listener(),
        )?;
    }

    // Ready to start spawning VUs so start the resource monitor to report high usage by the load
    // generator, which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener())?;

    let executor = Executor::new(
        definition.config,
        runner_context.clone(),
        definition.vu_hooks,
    )?;
    let report = runtime.block_on(executor.run(&definition.name, definition.profile_name.as_deref()));

    // Stops the progress bar and monitor threads.
    shutdown_handle.shutdown();

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let report = report?;
    let mut summary = report.summary;

    let elapsed = Duration::from_millis(summary.elapsed_ms);
    summary.thresholds = definition
        .thresholds
        .iter()
        .map(|threshold| threshold.evaluate(&report.snapshot, elapsed))
        .collect();

    print_run_summary(&summary);

    if !definition.no_summary_file {
        let name = (definition.summary_name_fn)(&NamingContext {
            scenario_name: &summary.scenario_name,
            label: &definition.summary_label,
            run_id: &summary.run_id,
            profile_name: summary.profile_name.as_deref(),
            concurrency: definition.concurrency,
        });
        std::fs::create_dir_all(&definition.summary_dir).with_context(|| {
            format!(
                "Failed to create summary directory {}",
                definition.summary_dir.display()
            )
        })?;
        let path = definition.summary_dir.join(name);
        write_run_summary(&summary, &path)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        log::info!("Wrote run summary to {}", path.display());
    }

    if let Some(summary_log) = &definition.summary_log {
        append_run_summary(&summary, summary_log).with_context(|| {
            format!("Failed to append run summary to {}", summary_log.display())
        })?;
    }

    if !summary.thresholds_passed() {
        let failed = summary.failed_thresholds().count();
        for threshold in summary.failed_thresholds() {
            log::error!(
                "Threshold failed: {} {} (observed {:?})",
                threshold.metric,
                threshold.expression,
                threshold.observed
            );
        }

        return Err(ThresholdFailure {
            run_id: summary.run_id.clone(),
            failed,
            total: summary.thresholds.len(),
        }
        .into());
    }

    Ok(summary)
}

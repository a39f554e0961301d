use std::sync::Arc;

use clap::Parser;
use surge_runner::prelude::{
    run, BehaviourFuture, HookResult, RunnerContext, ScenarioDefinitionBuilder, SurgeScenarioCli,
    ThresholdFailure, UserValuesConstraint, VuContext,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct VuContextValue {
    value: i32,
}

impl UserValuesConstraint for VuContextValue {}

fn sample_cli_cfg() -> SurgeScenarioCli {
    SurgeScenarioCli::parse_from([
        "test",
        "--stage",
        "500ms:2",
        "--tick-interval",
        "100ms",
        "--graceful-ramp-down",
        "1s",
        "--no-progress",
        "--no-summary-file",
    ])
}

fn ok_behaviour(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> BehaviourFuture<'_> {
    Box::pin(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(())
    })
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_tx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(),
    )
    .use_setup(setup);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn capture_error_in_vu_setup() {
    fn vu_setup(
        _ctx: &mut VuContext<RunnerContextValue, VuContextValue>,
    ) -> BehaviourFuture<'_> {
        Box::pin(async move { Err(anyhow::anyhow!("Error in VU setup hook")) })
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_setup",
        sample_cli_cfg(),
    )
    .use_vu_setup(vu_setup)
    .use_vu_behaviour(ok_behaviour);

    let summary = run(scenario).unwrap();

    // A VU whose setup failed never runs its behaviour.
    assert_eq!(None, summary.counter("iterations"));
}

#[test]
fn capture_error_in_vu_behaviour_and_continue() {
    fn vu_behaviour(
        ctx: &mut VuContext<RunnerContextValue, VuContextValue>,
    ) -> BehaviourFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if ctx.get().value < 5 {
                ctx.get_mut().value += 1;
            } else {
                // Save time running this test by shutting down once this has run a few times.
                ctx.runner_context().force_stop_scenario();
            }

            Err(anyhow::anyhow!("Error in VU behaviour hook"))
        })
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_behaviour_and_continue",
        sample_cli_cfg(),
    )
    .use_vu_behaviour(vu_behaviour);

    let summary = run(scenario).unwrap();

    assert!(summary.counter("iterations").unwrap() >= 6);
    assert_eq!(Some(0.0), summary.rate("iteration_success"));
}

#[test]
fn capture_panic_in_vu_behaviour() {
    fn vu_behaviour(
        ctx: &mut VuContext<RunnerContextValue, VuContextValue>,
    ) -> BehaviourFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if ctx.iteration() % 2 == 0 {
                panic!("Panic in VU behaviour hook");
            }
            Ok(())
        })
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_panic_in_vu_behaviour",
        sample_cli_cfg(),
    )
    .use_vu_behaviour(vu_behaviour);

    let summary = run(scenario).unwrap();

    let rate = summary.rate("iteration_success").unwrap();
    assert!(rate > 0.0 && rate < 1.0, "rate was {rate}");
}

#[test]
fn capture_error_in_vu_teardown() {
    fn vu_teardown(
        _ctx: &mut VuContext<RunnerContextValue, VuContextValue>,
    ) -> BehaviourFuture<'_> {
        Box::pin(async move { Err(anyhow::anyhow!("Error in VU teardown hook")) })
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_teardown",
        sample_cli_cfg(),
    )
    .use_vu_behaviour(ok_behaviour)
    .use_vu_teardown(vu_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_teardown",
        sample_cli_cfg(),
    )
    .use_vu_behaviour(ok_behaviour)
    .use_teardown(teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn failing_threshold_fails_run() {
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "failing_threshold_fails_run",
        sample_cli_cfg(),
    )
    .with_threshold("iteration_success", "rate>0.99")
    .with_threshold("not_recorded", "count>0")
    .use_vu_behaviour(ok_behaviour);

    let err = run(scenario).unwrap_err();
    let failure = err.downcast_ref::<ThresholdFailure>().unwrap();

    assert_eq!(1, failure.failed);
    assert_eq!(2, failure.total);
}

#[test]
fn write_summary_files() {
    let dir = tempfile::tempdir().unwrap();
    let summary_dir = dir.path().join("results");
    let summary_log = dir.path().join("runs.jsonl");

    let cli = SurgeScenarioCli::parse_from([
        "test",
        "--stage",
        "300ms:1",
        "--tick-interval",
        "100ms",
        "--no-progress",
        "--run-id",
        "fixed",
        "--summary-dir",
        summary_dir.to_str().unwrap(),
        "--summary-log",
        summary_log.to_str().unwrap(),
    ]);

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "write_summary_files",
        cli,
    )
    .use_vu_behaviour(ok_behaviour);

    let summary = run(scenario).unwrap();

    let written = std::fs::File::open(
        summary_dir.join("results_custom_fixed_write_summary_files_summary.json"),
    )
    .unwrap();
    let written = surge_summary_model::load_run_summary(written).unwrap();
    assert_eq!(summary.run_id, written.run_id);
    assert_eq!(summary.timeline, written.timeline);

    let logged = surge_summary_model::load_summary_runs(&summary_log).unwrap();
    assert_eq!(1, logged.len());
    assert_eq!("write_summary_files", logged[0].scenario_name);
}

use surge_http::prelude::*;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> BehaviourFuture<'_> {
    Box::pin(async move {
        let delay_ms = ctx.get().delay_ms;
        request_endpoint(ctx, Endpoint::HelloForm { delay_ms }).await
    })
}

/// No default thresholds, a slow `DELAY` is what this scenario measures.
fn scenario(
    cli: SurgeScenarioCli,
) -> ScenarioDefinitionBuilder<HttpRunnerContext, HttpVuContext> {
    ScenarioDefinitionBuilder::new(env!("CARGO_PKG_NAME"), cli)
        .with_summary_label(Endpoint::HelloForm { delay_ms: 0 }.slug())
        .with_default_profile(ProfilePreset::Concurrency)
        .use_setup(configure_client)
        .use_vu_setup(configure_delay)
        .use_vu_behaviour(vu_behaviour)
}

fn main() -> SurgeResult<()> {
    run(scenario(init()))?;

    Ok(())
}

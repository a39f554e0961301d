use surge_http::prelude::*;

/// Each iteration asks for between 1 and 100 cached rows.
fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> BehaviourFuture<'_> {
    Box::pin(async move { request_endpoint(ctx, Endpoint::random_cached_queries()).await })
}

fn main() -> SurgeResult<()> {
    let builder =
        ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(env!(
            "CARGO_PKG_NAME"
        ))
        .with_summary_label(Endpoint::CachedQueries(0).slug())
        .with_default_profile(ProfilePreset::Tfb)
        .with_threshold("http_req_duration", "p(99)<50")
        .with_threshold(CHECKS, "rate>0.99")
        .use_setup(configure_client)
        .use_vu_behaviour(vu_behaviour);

    run(builder)?;

    Ok(())
}

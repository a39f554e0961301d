use anyhow::Context;
use itertools::Itertools;
use surge_runner::prelude::{
    HookResult, RunnerContext, ShutdownSignalError, UserValuesConstraint, VuContext,
};

use crate::checks::record_checks;
use crate::client::{HttpClientInstrumented, DEFAULT_REQUEST_TIMEOUT};
use crate::context::{HttpRunnerContext, HttpVuContext};
use crate::endpoint::Endpoint;
use crate::prelude::BehaviourFuture;

/// Environment variable holding the server-side delay, in milliseconds, for the hello form.
pub const DELAY_ENV: &str = "DELAY";

/// Create the shared [HttpClientInstrumented] and store it in [HttpRunnerContext].
///
/// Use this as the global setup hook of any scenario that calls [request_endpoint].
pub fn configure_client(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let client = HttpClientInstrumented::new(ctx.registry().clone(), DEFAULT_REQUEST_TIMEOUT)?;
    log::debug!("Configured HTTP client for {}", ctx.base_url());
    ctx.get_mut().client = Some(client);

    Ok(())
}

/// Read the [DELAY_ENV] variable into the VU's [HttpVuContext]. Unset means no delay.
pub fn configure_delay(
    ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>,
) -> BehaviourFuture<'_> {
    Box::pin(async move {
        ctx.get_mut().delay_ms = parse_delay(std::env::var(DELAY_ENV).ok().as_deref())?;
        Ok(())
    })
}

fn parse_delay(value: Option<&str>) -> anyhow::Result<u64> {
    match value {
        None => Ok(0),
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| {
                format!("{DELAY_ENV} must be a whole number of milliseconds, got {value:?}")
            }),
    }
}

/// Send one request to `endpoint` and check the response.
///
/// The request is recorded in the `http_req*` metrics and each check in the `checks` rate. Returns
/// an error if the request fails or any check fails, so the iteration is counted as failed.
/// Cancelling the run abandons a request in flight.
pub async fn request_endpoint<V: UserValuesConstraint>(
    ctx: &mut VuContext<HttpRunnerContext, V>,
    endpoint: Endpoint,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let client = runner_context
        .get()
        .client
        .as_ref()
        .context("HTTP client is not configured, use configure_client as the setup hook")?;

    let request = endpoint.request(client.client(), runner_context.base_url());

    let mut shutdown_listener = ctx.shutdown_listener().clone();
    let response = tokio::select! {
        _ = shutdown_listener.wait_for_shutdown() => {
            return Err(ShutdownSignalError::default().into());
        }
        response = client.execute(request) => response?,
    };

    let checks = endpoint.checks(&response);
    if !record_checks(runner_context.registry(), &checks)? {
        let failed = checks.iter().filter(|c| !c.passed).map(|c| c.name).join(", ");
        anyhow::bail!("Checks failed for {endpoint}: {failed}");
    }

    Ok(())
}

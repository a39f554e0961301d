use surge_runner::prelude::UserValuesConstraint;

use crate::client::HttpClientInstrumented;

/// Run-wide state for HTTP scenarios. Populated by [crate::prelude::configure_client].
#[derive(Default, Debug)]
pub struct HttpRunnerContext {
    pub client: Option<HttpClientInstrumented>,
}

impl UserValuesConstraint for HttpRunnerContext {}

/// Per-VU state for HTTP scenarios.
#[derive(Default, Debug)]
pub struct HttpVuContext {
    /// Server-side delay to request from endpoints that support one.
    pub delay_ms: u64,
}

impl UserValuesConstraint for HttpVuContext {}

mod checks;
mod client;
mod common;
mod context;
mod endpoint;

pub mod prelude {
    /// Common operations for HTTP scenarios.
    ///
    /// A scenario usually needs [configure_client] as its setup hook and a behaviour that calls
    /// [request_endpoint].
    pub use crate::common::*;

    pub use crate::checks::{record_checks, Check, CHECKS};
    pub use crate::client::{HttpClientInstrumented, HttpResponse, DEFAULT_REQUEST_TIMEOUT};
    pub use crate::context::{HttpRunnerContext, HttpVuContext};
    pub use crate::endpoint::Endpoint;

    /// Re-export of the `surge_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use surge_runner::prelude::*;
}

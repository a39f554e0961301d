use clap::Parser;
use surge_http::prelude::*;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock server with one mounted response. The server runs on its own thread, so the returned
/// runtime only needs to live as long as the test.
fn mock_server(mock: Mock) -> (Runtime, MockServer) {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        mock.mount(&server).await;
        server
    });

    (rt, server)
}

fn cli(base_url: &str) -> SurgeScenarioCli {
    SurgeScenarioCli::parse_from([
        "test",
        "--base-url",
        base_url,
        "--stage",
        "500ms:2",
        "--tick-interval",
        "100ms",
        "--no-progress",
        "--no-summary-file",
    ])
}

fn plaintext(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> BehaviourFuture<'_> {
    Box::pin(async move { request_endpoint(ctx, Endpoint::Plaintext).await })
}

fn hello_form(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> BehaviourFuture<'_> {
    Box::pin(async move { request_endpoint(ctx, Endpoint::HelloForm { delay_ms: 0 }).await })
}

#[test]
fn passing_checks_against_mock_server() {
    let (_rt, server) = mock_server(
        Mock::given(method("GET"))
            .and(path("/plaintext"))
            .and(header("connection", "keep-alive"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("Hello, World!", "text/plain")),
    );

    let scenario = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new(
        "plaintext",
        cli(&server.uri()),
    )
    .with_threshold(CHECKS, "rate>0.99")
    .use_setup(configure_client)
    .use_vu_behaviour(plaintext);

    let summary = run(scenario).unwrap();

    assert!(summary.counter("http_reqs").unwrap() > 0);
    assert_eq!(Some(0.0), summary.rate("http_req_failed"));
    assert_eq!(Some(1.0), summary.rate("checks"));
    assert_eq!(Some(1.0), summary.rate("iteration_success"));
    assert!(summary.thresholds_passed());
}

#[test]
fn failing_checks_fail_iterations_and_thresholds() {
    let (_rt, server) = mock_server(
        Mock::given(method("GET"))
            .and(path("/plaintext"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("Goodbye", "text/plain")),
    );

    let scenario = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new(
        "plaintext",
        cli(&server.uri()),
    )
    .with_threshold(CHECKS, "rate>0.99")
    .use_setup(configure_client)
    .use_vu_behaviour(plaintext);

    let err = run(scenario).unwrap_err();

    assert!(err.downcast_ref::<ThresholdFailure>().is_some());
}

#[test]
fn server_errors_are_failed_requests() {
    let (_rt, server) = mock_server(
        Mock::given(method("GET"))
            .and(path("/plaintext"))
            .respond_with(ResponseTemplate::new(503)),
    );

    let scenario = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new(
        "plaintext",
        cli(&server.uri()),
    )
    .use_setup(configure_client)
    .use_vu_behaviour(plaintext);

    let summary = run(scenario).unwrap();

    assert_eq!(Some(1.0), summary.rate("http_req_failed"));
    assert_eq!(Some(0.0), summary.rate("iteration_success"));
}

#[test]
fn hello_form_posts_the_form() {
    let (_rt, server) = mock_server(
        Mock::given(method("POST"))
            .and(path("/helloform"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("delay=0&message=Hello, world!"))
            .respond_with(ResponseTemplate::new(200)),
    );

    let scenario = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new(
        "helloform",
        cli(&server.uri()),
    )
    .use_setup(configure_client)
    .use_vu_behaviour(hello_form);

    let summary = run(scenario).unwrap();

    // Unmatched requests get a 404 from the mock server.
    assert_eq!(Some(0.0), summary.rate("http_req_failed"));
    assert_eq!(Some(1.0), summary.rate("checks"));
}

#[test]
fn missing_client_fails_iterations() {
    let (_rt, server) = mock_server(
        Mock::given(method("GET"))
            .and(path("/plaintext"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("Hello, World!", "text/plain")),
    );

    let scenario = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new(
        "plaintext",
        cli(&server.uri()),
    )
    .use_vu_behaviour(plaintext);

    let summary = run(scenario).unwrap();

    assert_eq!(Some(0.0), summary.rate("iteration_success"));
    assert_eq!(None, summary.counter("http_reqs"));
}

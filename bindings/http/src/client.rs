use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use reqwest::{Client, RequestBuilder};
use surge_instruments::{MetricRegistry, OperationRecord};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// The `Content-Length` header, if it was sent and is a number.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Anything other than a 4xx or 5xx status.
    pub fn is_ok(&self) -> bool {
        self.status < 400
    }
}

/// An HTTP client that records `http_reqs`, `http_req_duration` and `http_req_failed` for every
/// request it sends.
///
/// Cheap to clone. Clones share the connection pool and the metric registry.
#[derive(Debug, Clone)]
pub struct HttpClientInstrumented {
    inner: Client,
    registry: Arc<MetricRegistry>,
}

impl HttpClientInstrumented {
    /// Build a client that sends `Host: localhost` and `Connection: keep-alive` with every request.
    pub fn new(registry: Arc<MetricRegistry>, timeout: Duration) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(HOST, HeaderValue::from_static("localhost"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { inner, registry })
    }

    /// The underlying client, for building requests to pass to [HttpClientInstrumented::execute].
    pub fn client(&self) -> &Client {
        &self.inner
    }

    /// Send the request and read the whole body.
    ///
    /// A transport error or a 4xx/5xx status is recorded as a failed request. Only transport
    /// errors are returned as `Err`.
    pub async fn execute(&self, request: RequestBuilder) -> anyhow::Result<HttpResponse> {
        let record = OperationRecord::new("http_req");

        let result = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse::new(status, headers, body))
        }
        .await;

        let outcome = match &result {
            Ok(response) if response.is_ok() => Ok(()),
            Ok(response) => Err(response.status),
            Err(_) => Err(0),
        };
        if let Err(e) = record.finish(&self.registry, &outcome) {
            log::error!("Failed to record HTTP request metrics: {e}");
        }

        result.context("HTTP request failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_content_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("13"));
        let response = HttpResponse::new(200, headers, "Hello, World!");

        assert_eq!(Some("text/plain; charset=utf-8"), response.content_type());
        assert_eq!(Some(13), response.content_length());
        assert!(response.is_ok());
    }

    #[test]
    fn missing_headers() {
        let response = HttpResponse::new(503, HeaderMap::new(), "");

        assert_eq!(None, response.content_type());
        assert_eq!(None, response.content_length());
        assert!(!response.is_ok());
    }
}

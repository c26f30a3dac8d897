use crate::config::TransportConfig;
use crate::{Error, Result};
use reqwest::{Proxy, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::{debug, error};

/// Shared outbound HTTP client.
///
/// Every upstream adapter goes through here, so the client-level timeout
/// bounds all outbound calls, wrapped or not.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .user_agent(concat!("weather-poetry/", env!("CARGO_PKG_VERSION")));

        if let Ok(proxy_url) = env::var("HTTP_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send a request and decode a JSON body from a 2xx response.
    ///
    /// Non-success statuses become [`Error::Upstream`] (404 becomes
    /// [`Error::NotFound`]); the upstream body is logged, never returned.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        source: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(source, status = status.as_u16(), body = %truncate(&body, 512), "upstream returned error status");
            return Err(status_error(source, status));
        }

        debug!(source, status = status.as_u16(), "upstream responded");
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(source, error = %e, "upstream body did not match expected shape");
            Error::malformed_response(source, e.to_string())
        })
    }
}

fn status_error(source: &'static str, status: StatusCode) -> Error {
    if status == StatusCode::NOT_FOUND {
        return Error::not_found_with_context(
            "upstream has no such resource",
            crate::ErrorContext::new().with_source(source),
        );
    }
    let retryable = status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT;
    Error::Upstream {
        status: status.as_u16(),
        message: format!(
            "{} answered {}",
            source,
            status.canonical_reason().unwrap_or("unknown status")
        ),
        retryable,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

//! Reqwest-based transport for the object storage API.

use std::sync::Arc;

use futures::TryStreamExt;
use reqwest::Client;

use super::{HttpRequest, HttpResponse, RequestBody, TRACING_TARGET, Transport};
use crate::config::ClientConfig;
use crate::{Error, Result};

/// Inner transport that holds the HTTP client and API root.
struct ReqwestTransportInner {
    http: Client,
    base_url: String,
}

/// [`Transport`] backed by a pooled [`reqwest::Client`].
///
/// Timeouts apply per exchange and come from
/// [`ClientConfig::effective_timeout`]. Dropping an in-flight request
/// future closes its connection.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Arc<ReqwestTransportInner>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Creates a transport for the endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            timeout_ms = timeout.as_millis() as u64,
            "Creating reqwest transport"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        let inner = ReqwestTransportInner {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the underlying HTTP client.
    pub fn http(&self) -> &Client {
        &self.inner.http
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = format!("{}{}", self.inner.base_url, request.path);

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await.map_err(Error::from)?;

        tracing::debug!(
            target: TRACING_TARGET,
            method = %request.method,
            url = %url,
            status = response.status().as_u16(),
            "Received response"
        );

        let status = response.status();
        let headers = response.headers().clone();
        let body = Box::pin(response.bytes_stream().map_err(Error::from));

        Ok(HttpResponse::new(status, headers, body))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else if err.is_body() || err.is_decode() {
            format!("failed to read response body: {err}")
        } else {
            err.to_string()
        };

        Error::transport(reason).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let config = ClientConfig::new("token");
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.inner.base_url, "https://api.liara.ir");
    }

    #[test]
    fn test_debug_omits_client() {
        let config = ClientConfig::new("token");
        let transport = ReqwestTransport::new(&config).unwrap();
        let debug = format!("{transport:?}");
        assert!(debug.contains("api.liara.ir"));
        assert!(!debug.contains("token"));
    }
}

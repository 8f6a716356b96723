//! Client for the remote object API.
//!
//! [`ObjectStorageClient`] turns object operations into HTTP exchanges, adds
//! authentication, retries transient failures and maps status codes onto
//! [`Error`]. The filesystem surface lives in [`StorageAdapter`](crate::StorageAdapter).

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::TryStreamExt;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use http::{Method, StatusCode};
use serde_json::json;

mod listing;
mod reader;
mod routes;

pub use reader::ObjectReader;
pub use routes::{OBJECT_ACL_HEADER, OBJECT_KEY_HEADER, OBJECT_SIZE_HEADER};
pub(crate) use routes::Routes;

use crate::config::ClientConfig;
use crate::error::OptionalExt;
use crate::retry::RetryPolicy;
use crate::transport::{ByteStream, HttpRequest, HttpResponse, RequestBody, Transport};
use crate::types::{
    ListingPage, MetadataEnvelope, ObjectKey, ObjectMetadata, UploadOutput, WriteOptions,
};
use crate::{Error, Result};

/// Tracing target for client operations.
pub const TRACING_TARGET: &str = "liara_storage::client";

/// Key probed by [`ObjectStorageClient::verify_reachable`].
const PROBE_KEY: &str = ".liara-storage-probe";

/// Inner client that holds configuration and the transport.
struct ObjectStorageClientInner {
    config: ClientConfig,
    routes: Routes,
    retry: RetryPolicy,
    authorization: HeaderValue,
    transport: Arc<dyn Transport>,
}

/// Client for the Liara object storage API.
///
/// Cheap to clone; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct ObjectStorageClient {
    inner: Arc<ObjectStorageClientInner>,
}

impl std::fmt::Debug for ObjectStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("api_version", &self.inner.config.api_version)
            .field("namespace", &self.inner.config.namespace)
            .finish_non_exhaustive()
    }
}

impl ObjectStorageClient {
    /// Creates a client that sends its requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn new(config: ClientConfig, transport: impl Transport) -> Result<Self> {
        config.validate()?;

        let mut authorization =
            HeaderValue::try_from(format!("Bearer {}", config.auth_token.trim())).map_err(|_| {
                Error::configuration("auth token contains characters not allowed in a header")
            })?;
        authorization.set_sensitive(true);

        tracing::info!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            api_version = %config.api_version,
            namespace = config.namespace.as_deref().unwrap_or_default(),
            max_retries = config.max_retries,
            "Object storage client initialized"
        );

        let inner = ObjectStorageClientInner {
            routes: Routes::new(&config),
            retry: config.retry_policy(),
            authorization,
            transport: Arc::new(transport),
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a client backed by the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = crate::transport::reqwest::ReqwestTransport::new(&config)?;
        Self::new(config, transport)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the retry policy applied to replayable requests.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Checks that the API answers and accepts the credentials.
    ///
    /// Looks up the metadata of a probe key; a missing probe object still
    /// proves the service is reachable.
    ///
    /// # Errors
    ///
    /// Returns the error of the probe request, after retries.
    pub async fn verify_reachable(&self) -> Result<()> {
        self.fetch_metadata(&ObjectKey::from(PROBE_KEY))
            .await
            .optional()?;

        tracing::debug!(target: TRACING_TARGET, "Object storage is reachable");
        Ok(())
    }

    /// Public URL of the object at `key`. Performs no request.
    pub fn public_url(&self, key: &ObjectKey) -> String {
        routes::public_url(&self.inner.config, key.as_str())
    }

    /// Uploads a body under `key`.
    ///
    /// Buffered bodies are retried; streamed bodies are sent exactly once.
    pub(crate) async fn upload(
        &self,
        key: &ObjectKey,
        wire_key: &str,
        body: RequestBody,
        options: &WriteOptions,
    ) -> Result<UploadOutput> {
        let declared = body.len().or(options.content_length);
        let counter = Arc::new(AtomicU64::new(0));

        let body = match body {
            RequestBody::Stream(stream) => {
                let counted = Arc::clone(&counter);
                let stream: ByteStream = Box::pin(stream.inspect_ok(move |chunk| {
                    counted.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                }));
                RequestBody::Stream(stream)
            }
            other => other,
        };

        let mut request = HttpRequest::new(Method::POST, self.inner.routes.upload())
            .with_header(OBJECT_KEY_HEADER, header_value(wire_key)?)
            .with_header(
                OBJECT_ACL_HEADER,
                HeaderValue::from_static(options.visibility.as_acl()),
            );

        if let Some(size) = declared {
            request = request.with_header(OBJECT_SIZE_HEADER, HeaderValue::from(size));
        }

        if let Some(content_type) = options.content_type.as_deref() {
            request = request.with_header(CONTENT_TYPE, header_value(content_type)?);
        }

        let streamed = !body.is_replayable();
        let request = request.with_body(body);

        self.send_with(request, key.as_str(), ignore_body).await?;

        let size = match declared {
            Some(size) if !streamed => size,
            _ => counter.load(Ordering::Relaxed),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            size,
            streamed,
            visibility = %options.visibility,
            "Object uploaded"
        );

        Ok(UploadOutput {
            key: key.clone(),
            size,
            visibility: options.visibility,
        })
    }

    /// Downloads the whole object. Absent objects are [`Error::NotFound`].
    pub(crate) async fn download(&self, key: &ObjectKey) -> Result<Bytes> {
        let request = HttpRequest::new(Method::GET, self.inner.routes.object(key.as_str()));
        self.send_with(request, key.as_str(), HttpResponse::bytes)
            .await
    }

    /// Opens the object for streaming. Absent objects are [`Error::NotFound`].
    pub(crate) async fn open(&self, key: &ObjectKey) -> Result<ObjectReader> {
        let request = HttpRequest::new(Method::GET, self.inner.routes.object(key.as_str()));
        self.send_with(request, key.as_str(), |response| async move {
            Ok::<_, Error>(ObjectReader::new(response))
        })
        .await
    }

    /// Fetches the metadata of a single object.
    pub(crate) async fn fetch_metadata(&self, key: &ObjectKey) -> Result<ObjectMetadata> {
        let request = HttpRequest::new(Method::GET, self.inner.routes.metadata(key.as_str()));
        let envelope: MetadataEnvelope = self
            .send_with(request, key.as_str(), HttpResponse::json_body)
            .await?;

        Ok(ObjectMetadata::from_wire(envelope.into_inner(), key))
    }

    /// Deletes one stored key. A missing key is not an error.
    pub(crate) async fn remove(&self, wire_key: &str) -> Result<()> {
        let request = HttpRequest::new(Method::DELETE, self.inner.routes.object(wire_key));
        let removed = self
            .send_with(request, wire_key, ignore_body)
            .await
            .optional()?;

        tracing::debug!(
            target: TRACING_TARGET,
            key = wire_key,
            existed = removed.is_some(),
            "Object deleted"
        );
        Ok(())
    }

    /// Server-side copy of `source` to `destination`.
    pub(crate) async fn copy_object(
        &self,
        source: &ObjectKey,
        destination: &ObjectKey,
    ) -> Result<()> {
        let body = json!({ "key": source.as_str(), "newKey": destination.as_str() });
        let request = HttpRequest::new(Method::POST, self.inner.routes.copy())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(RequestBody::Bytes(Bytes::from(serde_json::to_vec(&body)?)));

        self.send_with(request, source.as_str(), ignore_body)
            .await?;

        tracing::debug!(
            target: TRACING_TARGET,
            source = %source,
            destination = %destination,
            "Object copied"
        );
        Ok(())
    }

    /// Fetches one listing page.
    ///
    /// A missing prefix lists as empty. A 404 on a continuation page is
    /// returned as [`Error::NotFound`].
    pub(crate) async fn fetch_page(
        &self,
        prefix: &str,
        recursive: bool,
        token: Option<&str>,
    ) -> Result<ListingPage> {
        let mut request =
            HttpRequest::new(Method::GET, self.inner.routes.list()).with_query("prefix", prefix);

        if !recursive {
            request = request.with_query("delimiter", "/");
        }
        if let Some(token) = token {
            request = request.with_query("continuationToken", token);
        }
        if let Some(page_size) = self.inner.config.list_page_size {
            request = request.with_query("maxKeys", page_size.to_string());
        }

        let page = self
            .send_with(request, prefix, HttpResponse::json_body::<ListingPage>)
            .await;

        // Only the first page may absorb a 404.
        match token {
            None => Ok(page.optional()?.unwrap_or_default()),
            Some(_) => page,
        }
    }

    /// Sends a request and hands a successful response to `handle`.
    ///
    /// Replayable requests are retried by the client's [`RetryPolicy`], with
    /// `handle` inside the retried unit so that a body cut short in transit
    /// is fetched again. `key` names the object in a [`Error::NotFound`].
    async fn send_with<T, F, Fut>(&self, request: HttpRequest, key: &str, handle: F) -> Result<T>
    where
        F: Fn(HttpResponse) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let request = request.with_header(AUTHORIZATION, self.inner.authorization.clone());

        if !request.body.is_replayable() {
            let response = self.exchange(request, key).await?;
            return handle(response).await;
        }

        let handle = &handle;
        self.inner
            .retry
            .retry(move || {
                let attempt = request.try_clone();
                async move {
                    let request = attempt
                        .ok_or_else(|| Error::transport("request body cannot be replayed"))?;
                    let response = self.exchange(request, key).await?;
                    handle(response).await
                }
            })
            .await
    }

    /// Performs one exchange and classifies the response status.
    async fn exchange(&self, request: HttpRequest, key: &str) -> Result<HttpResponse> {
        let method = request.method.clone();
        let path = request.path.clone();

        let response = self.inner.transport.execute(request).await?;
        let status = response.status;

        tracing::trace!(
            target: TRACING_TARGET,
            method = %method,
            path = %path,
            status = status.as_u16(),
            "Exchange completed"
        );

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(key));
        }

        let body = response.text_lossy().await;

        if status.is_server_error() {
            tracing::warn!(
                target: TRACING_TARGET,
                method = %method,
                path = %path,
                status = status.as_u16(),
                "Server error"
            );
            return Err(Error::server(status.as_u16(), body));
        }

        tracing::warn!(
            target: TRACING_TARGET,
            method = %method,
            path = %path,
            status = status.as_u16(),
            body = %body,
            "Request rejected"
        );
        Err(Error::rejected(status.as_u16(), body))
    }
}

/// Response handler for exchanges whose body carries nothing of interest.
async fn ignore_body(_response: HttpResponse) -> Result<()> {
    Ok(())
}

/// Converts a key or content-type into a header value.
///
/// Non-ASCII keys are sent as raw UTF-8.
fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| Error::invalid_path(value, "contains characters not allowed in a header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn client(mock: &MockTransport) -> ObjectStorageClient {
        let config = ClientConfig::new("secret-token")
            .with_retries(2, std::time::Duration::from_millis(10));
        ObjectStorageClient::new(config, mock.clone()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = ObjectStorageClient::new(ClientConfig::new(" "), MockTransport::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = client(&MockTransport::new());
        let debug = format!("{client:?}");
        assert!(debug.contains("api.liara.ir"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_requests_carry_bearer_token() {
        let mock = MockTransport::new().with_auth_token("secret-token");
        let client = client(&mock);

        client.verify_reachable().await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].headers[AUTHORIZATION], "Bearer secret-token");
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        let mock = MockTransport::new().with_auth_token("other");
        let err = client(&mock).verify_reachable().await.unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 401, .. }));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried() {
        let mock = MockTransport::new();
        mock.fail_next(StatusCode::SERVICE_UNAVAILABLE, 2);
        let client = client(&mock);

        client.verify_reachable().await.unwrap();
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let mock = MockTransport::new();
        mock.fail_always(StatusCode::SERVICE_UNAVAILABLE);

        let err = client(&mock).verify_reachable().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock = MockTransport::new();
        mock.fail_next(StatusCode::BAD_REQUEST, 1);

        let err = client(&mock).verify_reachable().await.unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 400, .. }));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_sets_wire_headers() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let key = ObjectKey::from("docs/a.txt");
        let options = WriteOptions::default().with_content_type("text/plain");

        let output = client
            .upload(&key, key.as_str(), RequestBody::Bytes(Bytes::from("hello")), &options)
            .await
            .unwrap();
        assert_eq!(output.size, 5);

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/v1/storage/objects");
        assert_eq!(request.headers[&OBJECT_KEY_HEADER], "docs/a.txt");
        assert_eq!(request.headers[&OBJECT_SIZE_HEADER], "5");
        assert_eq!(request.headers[&OBJECT_ACL_HEADER], "private");
        assert_eq!(request.headers[CONTENT_TYPE], "text/plain");

        let stored = mock.object("docs/a.txt").unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_upload_is_sent_once() {
        let mock = MockTransport::new();
        mock.fail_next(StatusCode::SERVICE_UNAVAILABLE, 1);
        let client = client(&mock);
        let key = ObjectKey::from("big.bin");

        let stream: ByteStream = Box::pin(futures::stream::iter(vec![Ok(Bytes::from("ab"))]));
        let err = client
            .upload(&key, key.as_str(), RequestBody::Stream(stream), &WriteOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_page_query() {
        let mock = MockTransport::new();
        let config = ClientConfig::new("t").with_page_size(50);
        let client = ObjectStorageClient::new(config, mock.clone()).unwrap();

        client.fetch_page("docs/", false, Some("tok")).await.unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.path, "/v1/storage/objects/list");
        assert_eq!(
            request.query,
            vec![
                ("prefix".to_string(), "docs/".to_string()),
                ("delimiter".to_string(), "/".to_string()),
                ("continuationToken".to_string(), "tok".to_string()),
                ("maxKeys".to_string(), "50".to_string()),
            ]
        );
    }
}

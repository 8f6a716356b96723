//! HTTP transport abstraction.
//!
//! The client builds [`HttpRequest`]s relative to the API root and hands them
//! to a [`Transport`]. Transports own connection handling and report network
//! failures as [`Error::Transport`]; status codes are interpreted by the client.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use futures::stream::{self, BoxStream};
use http::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

/// Tracing target for transport operations.
pub const TRACING_TARGET: &str = "liara_storage::transport";

/// A stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Sends requests to the remote object API.
///
/// Implementations must be safe to share between tasks; every call is an
/// independent exchange.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Performs a single HTTP exchange.
    ///
    /// Returns a response for every status code. Only failures to complete
    /// the exchange (connection, timeout) are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Body of an outgoing request.
pub enum RequestBody {
    /// No body.
    Empty,
    /// A fully buffered body.
    Bytes(Bytes),
    /// A streamed body; it can be sent only once.
    Stream(ByteStream),
}

impl RequestBody {
    /// Whether the body can be sent again on retry.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }

    /// Length of the body, when known up front.
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(bytes) => Some(bytes.len() as u64),
            Self::Stream(_) => None,
        }
    }

    /// Whether the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// An outgoing request, addressed relative to the API root.
#[derive(Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute path below the API root, already percent-encoded.
    pub path: String,
    /// Query parameters (not yet encoded).
    pub query: Vec<(&'static str, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Creates a request without query, headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    /// Sets a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Clones the request if its body can be replayed.
    pub fn try_clone(&self) -> Option<Self> {
        let body = match &self.body {
            RequestBody::Empty => RequestBody::Empty,
            RequestBody::Bytes(bytes) => RequestBody::Bytes(bytes.clone()),
            RequestBody::Stream(_) => return None,
        };

        Some(Self {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            body,
        })
    }
}

/// A response from the remote API.
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Lazily received body.
    pub body: ByteStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Creates a response with a streamed body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with a buffered body and a matching `Content-Length`.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        Self::new(status, headers, Box::pin(stream::once(async move { Ok(body) })))
    }

    /// Creates a JSON response.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::from_bytes(status, value.to_string());
        response.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Declared `Content-Length`, if present and valid.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }

    /// Collects the whole body.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Transport`] if the body stream fails or if fewer or
    /// more bytes arrive than `Content-Length` declared.
    pub async fn bytes(self) -> Result<Bytes> {
        let expected = self.content_length();
        let mut buffer = BytesMut::with_capacity(expected.unwrap_or(0).min(1 << 20) as usize);

        let mut body = self.body;
        while let Some(chunk) = body.try_next().await? {
            buffer.extend_from_slice(&chunk);
        }

        check_length(expected, buffer.len() as u64)?;
        Ok(buffer.freeze())
    }

    /// Collects and decodes a JSON body.
    pub async fn json_body<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Collects the body as text for diagnostics, never failing.
    pub async fn text_lossy(self) -> String {
        match self.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => format!("<unreadable body: {err}>"),
        }
    }
}

/// Verifies that a body was received completely.
pub(crate) fn check_length(expected: Option<u64>, received: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != received => Err(Error::transport(format!(
            "body length mismatch: expected {expected} bytes, received {received}"
        ))),
        _ => Ok(()),
    }
}

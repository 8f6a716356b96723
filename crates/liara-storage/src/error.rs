//! Error types and utilities for object storage operations.

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for all operations in this crate.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Maximum number of characters of a rejected response body kept in [`Error::Rejected`].
pub const MAX_REJECTED_BODY_CHARS: usize = 1024;

/// Unified error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object does not exist on the remote service (HTTP 404).
    #[error("Object '{key}' not found")]
    NotFound { key: String },

    /// The service definitively rejected the request (HTTP 4xx other than 404).
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Network failure, server error (HTTP 5xx) or a malformed exchange.
    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        status: Option<u16>,
        #[source]
        source: Option<BoxedError>,
    },

    /// Client options are missing or invalid.
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The operation cannot be applied to the given path.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A caller-supplied byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not found error for the given key
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a rejected error, truncating the body
    pub fn rejected(status: u16, body: impl AsRef<str>) -> Self {
        Self::Rejected {
            status,
            body: body.as_ref().chars().take(MAX_REJECTED_BODY_CHARS).collect(),
        }
    }

    /// Create a transport error without an HTTP status
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            status: None,
            source: None,
        }
    }

    /// Create a transport error for a server-side (5xx) response
    pub fn server(status: u16, body: impl AsRef<str>) -> Self {
        let body: String = body.as_ref().chars().take(MAX_REJECTED_BODY_CHARS).collect();
        Self::Transport {
            reason: format!("server responded with status {status}: {body}"),
            status: Some(status),
            source: None,
        }
    }

    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Attach a source error to a transport error. Other variants are returned unchanged.
    pub fn with_source(self, source: impl Into<BoxedError>) -> Self {
        match self {
            Self::Transport { reason, status, .. } => Self::Transport {
                reason,
                status,
                source: Some(source.into()),
            },
            other => other,
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this error should be retried.
    ///
    /// Only transport failures are retryable; a request the server has
    /// rejected is never sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(e) => e,
            not_found @ Error::NotFound { .. } => {
                std::io::Error::new(std::io::ErrorKind::NotFound, not_found)
            }
            other => std::io::Error::other(other),
        }
    }
}

/// Absorbs [`Error::NotFound`] into `Ok(None)`.
pub trait OptionalExt<T> {
    /// Convert a not found error into `None`, keeping every other error.
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_body_is_truncated() {
        let body = "x".repeat(MAX_REJECTED_BODY_CHARS * 2);
        let Error::Rejected { status, body } = Error::rejected(409, body) else {
            panic!("expected rejected error");
        };
        assert_eq!(status, 409);
        assert_eq!(body.len(), MAX_REJECTED_BODY_CHARS);
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::transport("connection reset").is_retryable());
        assert!(Error::server(503, "unavailable").is_retryable());

        assert!(!Error::rejected(400, "bad request").is_retryable());
        assert!(!Error::not_found("a/b").is_retryable());
        assert!(!Error::configuration("missing token").is_retryable());
    }

    #[test]
    fn test_status() {
        assert_eq!(Error::not_found("k").status(), Some(404));
        assert_eq!(Error::rejected(401, "").status(), Some(401));
        assert_eq!(Error::server(502, "").status(), Some(502));
        assert_eq!(Error::transport("timeout").status(), None);
    }

    #[test]
    fn test_display() {
        let error = Error::rejected(403, "forbidden");
        let display = error.to_string();
        assert!(display.contains("403"));
        assert!(display.contains("forbidden"));
    }

    #[test]
    fn test_optional() {
        let found: Result<u32> = Ok(7);
        assert_eq!(found.optional().unwrap(), Some(7));

        let missing: Result<u32> = Err(Error::not_found("gone"));
        assert_eq!(missing.optional().unwrap(), None);

        let rejected: Result<u32> = Err(Error::rejected(400, "bad"));
        assert!(rejected.optional().is_err());
    }

    #[test]
    fn test_with_source_only_applies_to_transport() {
        let error = Error::transport("reset").with_source(std::io::Error::other("socket"));
        assert!(std::error::Error::source(&error).is_some());

        let error = Error::rejected(400, "bad").with_source(std::io::Error::other("ignored"));
        assert!(std::error::Error::source(&error).is_none());
    }

    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::not_found("k").into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);

        let io: std::io::Error = Error::transport("reset").into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
    }
}

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod adapter;
mod client;
mod config;
mod error;
/// Retry policy for transient failures.
pub mod retry;
/// HTTP transport abstraction and implementations.
pub mod transport;
/// Keys, metadata, listing entries and upload options.
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[doc(hidden)]
pub mod prelude;

pub use adapter::StorageAdapter;
pub use client::{
    OBJECT_ACL_HEADER, OBJECT_KEY_HEADER, OBJECT_SIZE_HEADER, ObjectReader, ObjectStorageClient,
};
pub use config::{
    ApiVersion, ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{BoxedError, Error, MAX_REJECTED_BODY_CHARS, OptionalExt, Result};

/// Tracing target for adapter operations.
pub use adapter::TRACING_TARGET as TRACING_TARGET_ADAPTER;
/// Tracing target for client operations.
pub use client::TRACING_TARGET as TRACING_TARGET_CLIENT;

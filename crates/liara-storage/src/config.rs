//! Client configuration.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use url::Url;

use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.liara.ir";

/// Default timeout for a single HTTP exchange: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Revision of the remote object API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// `/v1/storage/objects`, no namespace.
    #[default]
    V1,
    /// `/v2/storage/{namespace}/objects`, namespace required.
    V2,
}

impl ApiVersion {
    /// Whether this revision addresses objects through a namespace.
    pub const fn requires_namespace(&self) -> bool {
        matches!(self, Self::V2)
    }

    /// Path of the objects collection for this revision.
    pub(crate) fn objects_path(&self, namespace: Option<&str>) -> String {
        match (self, namespace) {
            (Self::V2, Some(ns)) => format!("/v2/storage/{}/objects", urlencoding::encode(ns)),
            (Self::V2, None) => "/v2/storage/objects".to_string(),
            (Self::V1, _) => "/v1/storage/objects".to_string(),
        }
    }
}

/// Configuration for an [`ObjectStorageClient`](crate::ObjectStorageClient).
///
/// Built once per client and never mutated afterwards.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL of the storage API
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-url",
            env = "LIARA_STORAGE_URL",
            default_value = DEFAULT_BASE_URL
        )
    )]
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Bearer token sent with every request
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-token", env = "LIARA_STORAGE_TOKEN", hide_env_values = true)
    )]
    pub auth_token: String,

    /// Namespace used by namespaced API versions and public URLs
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-namespace", env = "LIARA_STORAGE_NAMESPACE")
    )]
    #[serde(default)]
    pub namespace: Option<String>,

    /// Revision of the storage API
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-api-version", env = "LIARA_STORAGE_API_VERSION", default_value = "v1")
    )]
    #[serde(default)]
    pub api_version: ApiVersion,

    /// Timeout of a single HTTP exchange in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-timeout", env = "LIARA_STORAGE_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of retries for transient failures
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-max-retries", env = "LIARA_STORAGE_MAX_RETRIES", default_value = "3")
    )]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-retry-backoff-ms",
            env = "LIARA_STORAGE_RETRY_BACKOFF_MS",
            default_value = "100"
        )
    )]
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum number of entries requested per listing page
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-page-size", env = "LIARA_STORAGE_PAGE_SIZE")
    )]
    #[serde(default)]
    pub list_page_size: Option<u32>,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-user-agent", env = "LIARA_STORAGE_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("auth_token", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("list_page_size", &self.list_page_size)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration for the default endpoint with the given token.
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: auth_token.into(),
            namespace: None,
            api_version: ApiVersion::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            list_page_size: None,
            user_agent: None,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the API revision.
    #[must_use]
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the retry budget and initial backoff.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Set the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.list_page_size = Some(page_size);
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the effective timeout, using the default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout_secs == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.timeout_secs)
        }
    }

    /// Returns the effective user agent, using the default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .filter(|ua| !ua.is_empty())
            .unwrap_or_else(Self::default_user_agent)
    }

    /// Returns the default user agent string.
    fn default_user_agent() -> String {
        format!("liara-storage/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    /// Path of the objects collection on the API.
    pub(crate) fn objects_path(&self) -> String {
        self.api_version.objects_path(self.namespace.as_deref())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the token is missing, a namespace
    /// is required but absent, or a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(Error::configuration("auth token is required"));
        }

        match self.namespace.as_deref() {
            Some(ns) if ns.trim().is_empty() || ns.contains('/') => {
                return Err(Error::configuration(format!(
                    "namespace '{ns}' must be non-empty and contain no '/'"
                )));
            }
            None if self.api_version.requires_namespace() => {
                return Err(Error::configuration(format!(
                    "namespace is required by API version {}",
                    self.api_version
                )));
            }
            _ => {}
        }

        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "base URL must use http or https, got '{}'",
                self.base_url.scheme()
            )));
        }

        if self.list_page_size == Some(0) {
            return Err(Error::configuration("list page size cannot be zero"));
        }

        Ok(())
    }
}

//! Object metadata and the wire shapes it is decoded from.

use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};

use super::object_key::{ObjectKey, SEPARATOR};

/// Metadata describing a stored object or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Normalized key of the object.
    pub key: ObjectKey,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time reported by the service.
    pub last_modified: Option<Timestamp>,
    /// Whether this entry is a directory marker.
    pub is_directory: bool,
    /// MIME content-type reported by the service.
    pub content_type: Option<String>,
}

impl ObjectMetadata {
    /// Metadata for a directory that only exists implicitly.
    pub fn directory(key: ObjectKey) -> Self {
        Self {
            key,
            size: 0,
            last_modified: None,
            is_directory: true,
            content_type: None,
        }
    }

    /// Builds metadata from a decoded wire object.
    ///
    /// `fallback_key` is used when the service omits the key, which it does
    /// for single-object metadata lookups.
    pub(crate) fn from_wire(raw: WireObject, fallback_key: &ObjectKey) -> Self {
        let wire_key = raw.key.unwrap_or_else(|| fallback_key.to_string());
        let is_directory = raw.size == 0 && wire_key.ends_with(SEPARATOR);

        Self {
            key: ObjectKey::normalize(&wire_key),
            size: raw.size,
            last_modified: raw.last_modified.as_deref().and_then(parse_timestamp),
            is_directory,
            content_type: raw.content_type.filter(|ct| !ct.is_empty()),
        }
    }

    /// Last modification time as seconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<i64> {
        self.last_modified.map(|ts| ts.as_second())
    }

    /// The object's MIME type.
    ///
    /// Falls back to a guess from the key's extension when the service
    /// did not report a content-type. Directories have no MIME type.
    pub fn mimetype(&self) -> Option<String> {
        if self.is_directory {
            return None;
        }

        self.content_type.clone().or_else(|| {
            mime_guess::from_path(self.key.as_str())
                .first()
                .map(|mime| mime.essence_str().to_string())
        })
    }
}

/// Parses a timestamp as reported by the service.
///
/// Accepts RFC 3339, RFC 2822 (HTTP dates), naive `YYYY-MM-DD HH:MM:SS`
/// interpreted as UTC, and integer epoch seconds. This is the only place
/// service dates are parsed.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = value.parse::<Timestamp>() {
        return Some(ts);
    }

    if let Ok(zoned) = jiff::fmt::rfc2822::parse(value) {
        return Some(zoned.timestamp());
    }

    if let Ok(datetime) = value.parse::<jiff::civil::DateTime>() {
        return datetime
            .to_zoned(jiff::tz::TimeZone::UTC)
            .ok()
            .map(|zoned| zoned.timestamp());
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| Timestamp::from_second(secs).ok())
}

/// An object as described by the remote API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireObject {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Metadata responses come either flat or wrapped in a `metadata` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MetadataEnvelope {
    Wrapped { metadata: WireObject },
    Flat(WireObject),
}

impl MetadataEnvelope {
    pub fn into_inner(self) -> WireObject {
        match self {
            Self::Wrapped { metadata } => metadata,
            Self::Flat(object) => object,
        }
    }
}

/// Sizes are numbers, but some API revisions send them as strings.
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
        Null(()),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) if s.trim().is_empty() => Ok(0),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Size::Null(()) => Ok(0),
    }
}

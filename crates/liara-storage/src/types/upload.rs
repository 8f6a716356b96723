//! Upload options and results.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::ObjectKey;

/// Access level attached to an object at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Readable by anyone through the public URL.
    Public,
    /// Readable only with credentials.
    #[default]
    Private,
}

impl Visibility {
    /// Value sent in the ACL header.
    pub const fn as_acl(&self) -> &'static str {
        match self {
            Self::Public => "public-read",
            Self::Private => "private",
        }
    }
}

/// Options applied to a single upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Access level of the stored object. Defaults to private.
    pub visibility: Visibility,
    /// MIME content-type to store with the object.
    pub content_type: Option<String>,
    /// Length of a streamed body, when the caller knows it.
    ///
    /// Ignored for buffered uploads, whose length is always known.
    pub content_length: Option<u64>,
}

impl WriteOptions {
    /// Options with the given visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Options with the given content-type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Options with a known stream length.
    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }
}

/// Acknowledgement of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutput {
    /// Key the object was stored under.
    pub key: ObjectKey,
    /// Number of bytes sent.
    pub size: u64,
    /// Access level the object was stored with.
    pub visibility: Visibility,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_visibility_default_is_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!(WriteOptions::default().visibility, Visibility::Private);
    }

    #[test]
    fn test_visibility_acl() {
        assert_eq!(Visibility::Public.as_acl(), "public-read");
        assert_eq!(Visibility::Private.as_acl(), "private");
    }

    #[test]
    fn test_visibility_from_str() {
        assert_eq!(Visibility::from_str("public").unwrap(), Visibility::Public);
        assert_eq!(Visibility::from_str("PRIVATE").unwrap(), Visibility::Private);
        assert!(Visibility::from_str("world").is_err());
    }

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::default()
            .with_visibility(Visibility::Public)
            .with_content_type("text/csv")
            .with_content_length(8);

        assert_eq!(options.visibility, Visibility::Public);
        assert_eq!(options.content_type.as_deref(), Some("text/csv"));
        assert_eq!(options.content_length, Some(8));
    }
}

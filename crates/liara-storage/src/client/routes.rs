//! Endpoint paths and headers of the remote object API.

use http::header::HeaderName;

use crate::config::ClientConfig;

/// Header carrying the destination key of an upload.
pub const OBJECT_KEY_HEADER: HeaderName = HeaderName::from_static("x-liara-object-key");

/// Header carrying the byte length of an upload.
pub const OBJECT_SIZE_HEADER: HeaderName = HeaderName::from_static("x-liara-object-size");

/// Header carrying the ACL of an upload.
pub const OBJECT_ACL_HEADER: HeaderName = HeaderName::from_static("x-liara-object-acl");

/// Paths of the object endpoints for one API revision.
#[derive(Debug, Clone)]
pub(crate) struct Routes {
    objects: String,
}

impl Routes {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            objects: config.objects_path(),
        }
    }

    /// `POST` target for uploads.
    pub fn upload(&self) -> String {
        self.objects.clone()
    }

    /// `GET`/`DELETE` target for a single object.
    pub fn object(&self, key: &str) -> String {
        format!("{}/{}", self.objects, encode_key(key))
    }

    /// `GET` target for object metadata.
    pub fn metadata(&self, key: &str) -> String {
        format!("{}/metadata/{}", self.objects, encode_key(key))
    }

    /// `POST` target for server-side copies.
    pub fn copy(&self) -> String {
        format!("{}/copy", self.objects)
    }

    /// `GET` target for listings.
    pub fn list(&self) -> String {
        format!("{}/list", self.objects)
    }
}

/// Percent-encodes each segment of a key, keeping separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Public URL of an object: base URL, namespace, key.
pub(crate) fn public_url(config: &ClientConfig, key: &str) -> String {
    let base = config.base_url.as_str().trim_end_matches('/');
    match config.namespace.as_deref() {
        Some(ns) => format!("{base}/{}/{}", urlencoding::encode(ns), encode_key(key)),
        None => format!("{base}/{}", encode_key(key)),
    }
}

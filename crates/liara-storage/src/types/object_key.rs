//! Object keys and path normalization.
//!
//! The remote service has a flat key space. Directories are a convention:
//! a key followed by [`SEPARATOR`] marks a directory.

use std::fmt;

use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// A normalized object key.
///
/// Keys never start or end with a separator and never contain empty
/// segments. Every other segment, `.`, `..` and `\` included, is kept
/// verbatim so that a key read back from a listing addresses the same stored
/// object. The empty key is the root of the key space.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Deref, Display, Serialize, Deserialize)]
#[deref(forward)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Normalizes an arbitrary caller path into a key.
    ///
    /// Leading, trailing and repeated separators are removed. A path of only
    /// separators, or a lone `.`, names the root. Never fails.
    pub fn normalize(path: &str) -> Self {
        let segments: Vec<&str> = path
            .split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            ["."] => Self::root(),
            _ => Self(segments.join("/")),
        }
    }

    /// The root key.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns true for the root key.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// The marker key representing this key as a directory (`key/`).
    ///
    /// Returns `None` for the root, which has no marker object.
    pub fn directory_marker(&self) -> Option<String> {
        if self.is_root() {
            None
        } else {
            Some(format!("{}{SEPARATOR}", self.0))
        }
    }

    /// Prefix matching every key below this one: `key/`, or `""` for the root.
    pub fn list_prefix(&self) -> String {
        self.directory_marker().unwrap_or_default()
    }

    /// The parent key; the root is its own parent.
    pub fn parent(&self) -> Self {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        }
    }

    /// Last segment of the key.
    pub fn file_name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Appends a (normalized) relative path to this key.
    pub fn join(&self, child: &str) -> Self {
        Self::normalize(&format!("{}{SEPARATOR}{child}", self.0))
    }

    /// Returns true if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ObjectKey) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// Directories between `ancestor` (exclusive) and `self` (exclusive),
    /// shallowest first.
    ///
    /// For `a/b/c/d.txt` below `a` this yields `a/b` and `a/b/c`.
    pub fn intermediate_dirs(&self, ancestor: &ObjectKey) -> Vec<ObjectKey> {
        if !self.is_descendant_of(ancestor) {
            return Vec::new();
        }

        let start = if ancestor.is_root() {
            0
        } else {
            ancestor.0.len() + 1
        };

        self.0[start..]
            .match_indices(SEPARATOR)
            .map(|(idx, _)| Self(self.0[..start + idx].to_string()))
            .collect()
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({:?})", self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectKey {
    fn from(path: &str) -> Self {
        Self::normalize(path)
    }
}

impl From<String> for ObjectKey {
    fn from(path: String) -> Self {
        Self::normalize(&path)
    }
}

impl From<&ObjectKey> for ObjectKey {
    fn from(key: &ObjectKey) -> Self {
        key.clone()
    }
}

impl PartialEq<str> for ObjectKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_collapses() {
        assert_eq!(ObjectKey::normalize("/a//b/"), "a/b");
        assert_eq!(ObjectKey::normalize("a/b"), "a/b");
        assert_eq!(ObjectKey::normalize("///reports///2024//jan.csv"), "reports/2024/jan.csv");
    }

    #[test]
    fn test_normalize_root() {
        assert!(ObjectKey::normalize("").is_root());
        assert!(ObjectKey::normalize(".").is_root());
        assert!(ObjectKey::normalize("/").is_root());
        assert!(ObjectKey::normalize("/./").is_root());
    }

    #[test]
    fn test_normalize_keeps_literal_segments() {
        assert_eq!(ObjectKey::normalize("a/./b"), "a/./b");
        assert_eq!(ObjectKey::normalize("a/b/../c"), "a/b/../c");
        assert_eq!(ObjectKey::normalize("notes\\q1.txt"), "notes\\q1.txt");
        assert_eq!(ObjectKey::normalize("notes\\q1.txt").parent(), "");
        assert_eq!(ObjectKey::normalize("..hidden/.env"), "..hidden/.env");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for path in ["/a//b/", "x", "", ".", "deep/./nested/../path/", "\\win\\style"] {
            let once = ObjectKey::normalize(path);
            let twice = ObjectKey::normalize(once.as_str());
            assert_eq!(once, twice, "path {path:?}");
        }
    }

    #[test]
    fn test_directory_marker() {
        assert_eq!(
            ObjectKey::normalize("photos/").directory_marker().as_deref(),
            Some("photos/")
        );
        assert_eq!(ObjectKey::root().directory_marker(), None);
        assert_eq!(ObjectKey::root().list_prefix(), "");
        assert_eq!(ObjectKey::from("a/b").list_prefix(), "a/b/");
    }

    #[test]
    fn test_parent_and_file_name() {
        let key = ObjectKey::from("reports/2024/jan.csv");
        assert_eq!(key.parent(), "reports/2024");
        assert_eq!(key.file_name(), "jan.csv");

        let top = ObjectKey::from("top.txt");
        assert!(top.parent().is_root());
        assert_eq!(top.file_name(), "top.txt");
    }

    #[test]
    fn test_join() {
        let dir = ObjectKey::from("a/b");
        assert_eq!(dir.join("c/d.txt"), "a/b/c/d.txt");
        assert_eq!(ObjectKey::root().join("/x/"), "x");
    }

    #[test]
    fn test_is_descendant_of() {
        let key = ObjectKey::from("a/b/c");
        assert!(key.is_descendant_of(&ObjectKey::from("a")));
        assert!(key.is_descendant_of(&ObjectKey::root()));
        assert!(!key.is_descendant_of(&ObjectKey::from("a/b/c")));
        assert!(!ObjectKey::from("ab/c").is_descendant_of(&ObjectKey::from("a")));
    }

    #[test]
    fn test_intermediate_dirs() {
        let key = ObjectKey::from("a/b/c/d.txt");
        assert_eq!(
            key.intermediate_dirs(&ObjectKey::from("a")),
            vec![ObjectKey::from("a/b"), ObjectKey::from("a/b/c")]
        );
        assert_eq!(
            key.intermediate_dirs(&ObjectKey::root()),
            vec![
                ObjectKey::from("a"),
                ObjectKey::from("a/b"),
                ObjectKey::from("a/b/c")
            ]
        );
        assert!(ObjectKey::from("a/d.txt").intermediate_dirs(&ObjectKey::from("a")).is_empty());
        assert!(key.intermediate_dirs(&ObjectKey::from("z")).is_empty());
    }

    #[test]
    fn test_serde_transparent() {
        let key = ObjectKey::from("a/b");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"a/b\"");
    }
}

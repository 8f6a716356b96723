//! Directory listing entries and directory emulation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::metadata::{ObjectMetadata, WireObject};
use super::object_key::ObjectKey;

/// Kind of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(AsRefStr, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// A single entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Whether this is a file or a directory.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Normalized path of the entry.
    pub path: ObjectKey,
    /// Normalized path of the directory containing the entry.
    pub dirname: ObjectKey,
    /// Size in bytes; zero for directories.
    pub size: u64,
    /// Last modification time in epoch seconds, when known.
    pub timestamp: Option<i64>,
}

impl ListingEntry {
    /// An entry for a directory.
    pub fn dir(path: ObjectKey) -> Self {
        Self {
            kind: EntryKind::Dir,
            dirname: path.parent(),
            path,
            size: 0,
            timestamp: None,
        }
    }

    /// Returns true for directory entries.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Returns true for file entries.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

impl From<ObjectMetadata> for ListingEntry {
    fn from(meta: ObjectMetadata) -> Self {
        let timestamp = meta.timestamp();
        let kind = if meta.is_directory {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        Self {
            kind,
            dirname: meta.key.parent(),
            path: meta.key,
            size: meta.size,
            timestamp,
        }
    }
}

/// One page of a listing as returned by the remote API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListingPage {
    #[serde(default)]
    pub objects: Vec<WireObject>,
    #[serde(default)]
    pub common_prefixes: Vec<String>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// Turns raw listing pages into entries, synthesizing implied directories.
///
/// Every directory below the listing root is emitted exactly once, whether it
/// comes from a marker object, a common prefix or only from the keys of the
/// objects inside it. A non-recursive emulator reports only immediate
/// children of the root, even when the server ignored the delimiter.
#[derive(Debug)]
pub(crate) struct DirectoryEmulator {
    root: ObjectKey,
    recursive: bool,
    seen_dirs: HashSet<ObjectKey>,
}

impl DirectoryEmulator {
    pub fn new(root: ObjectKey, recursive: bool) -> Self {
        Self {
            root,
            recursive,
            seen_dirs: HashSet::new(),
        }
    }

    /// Entries produced by one page, in page order.
    pub fn page_entries(&mut self, page: ListingPage) -> Vec<ListingEntry> {
        let mut entries = Vec::with_capacity(page.objects.len() + page.common_prefixes.len());

        for prefix in page.common_prefixes {
            let key = ObjectKey::normalize(&prefix);
            self.push_dir_with_ancestors(key, &mut entries);
        }

        for object in page.objects {
            let meta = ObjectMetadata::from_wire(object, &self.root);
            if !meta.key.is_descendant_of(&self.root) {
                continue;
            }

            if meta.is_directory {
                self.push_dir_with_ancestors(meta.key, &mut entries);
            } else {
                self.push_ancestors(&meta.key, &mut entries);
                if self.in_scope(&meta.key) {
                    entries.push(ListingEntry::from(meta));
                }
            }
        }

        entries
    }

    /// Non-recursive listings stop at the immediate children of the root.
    fn in_scope(&self, key: &ObjectKey) -> bool {
        self.recursive || key.parent() == self.root
    }

    fn push_dir_with_ancestors(&mut self, key: ObjectKey, entries: &mut Vec<ListingEntry>) {
        if !key.is_descendant_of(&self.root) {
            return;
        }
        self.push_ancestors(&key, entries);
        if self.in_scope(&key) && self.seen_dirs.insert(key.clone()) {
            entries.push(ListingEntry::dir(key));
        }
    }

    fn push_ancestors(&mut self, key: &ObjectKey, entries: &mut Vec<ListingEntry>) {
        let depth = if self.recursive { usize::MAX } else { 1 };
        for dir in key.intermediate_dirs(&self.root).into_iter().take(depth) {
            if self.seen_dirs.insert(dir.clone()) {
                entries.push(ListingEntry::dir(dir));
            }
        }
    }
}

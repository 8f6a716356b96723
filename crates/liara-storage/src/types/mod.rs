//! Data types shared by the client and its callers.

pub mod listing;
pub mod metadata;
pub mod object_key;
pub mod upload;

pub use listing::{EntryKind, ListingEntry};
pub(crate) use listing::{DirectoryEmulator, ListingPage};
pub use metadata::{ObjectMetadata, parse_timestamp};
pub(crate) use metadata::MetadataEnvelope;
pub use object_key::{ObjectKey, SEPARATOR};
pub use upload::{UploadOutput, Visibility, WriteOptions};

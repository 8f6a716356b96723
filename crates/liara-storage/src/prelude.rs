//! Convenience re-exports.

pub use crate::client::{ObjectReader, ObjectStorageClient};
pub use crate::config::{ApiVersion, ClientConfig};
pub use crate::transport::{ByteStream, Transport};
pub use crate::types::{
    EntryKind, ListingEntry, ObjectKey, ObjectMetadata, UploadOutput, Visibility, WriteOptions,
};
pub use crate::{Error, OptionalExt, Result, StorageAdapter};

//! Filesystem-style adapter over the object API.

use bytes::Bytes;
use futures::TryStreamExt;
use futures::stream::BoxStream;

use crate::client::{ObjectReader, ObjectStorageClient};
use crate::error::OptionalExt;
use crate::transport::{ByteStream, RequestBody};
use crate::types::{ListingEntry, ObjectKey, ObjectMetadata, UploadOutput, WriteOptions};
use crate::{Error, Result};

/// Tracing target for adapter operations.
pub const TRACING_TARGET: &str = "liara_storage::adapter";

/// Filesystem operations on top of a flat object store.
///
/// Paths are normalized before use: leading and trailing separators are
/// dropped and repeated separators collapse. Listed paths address the same
/// objects when passed back in. Directories are emulated with zero-byte
/// `dir/` marker objects and with the shared prefixes of stored keys.
///
/// Lookups of absent objects return `Ok(None)`; every other failure is an
/// [`Error`].
#[async_trait::async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Stores `contents` at `path`, replacing any existing object.
    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> Result<UploadOutput>;

    /// Stores a streamed body at `path`.
    ///
    /// The body is sent once; a failed streamed upload is not retried.
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: &WriteOptions,
    ) -> Result<UploadOutput>;

    /// Replaces the object at `path`. Same as [`write`](Self::write).
    async fn update(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> Result<UploadOutput> {
        self.write(path, contents, options).await
    }

    /// Replaces the object at `path` from a stream.
    async fn update_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: &WriteOptions,
    ) -> Result<UploadOutput> {
        self.write_stream(path, contents, options).await
    }

    /// Moves an object by copying it and deleting the source.
    ///
    /// If the copy fails the source is left untouched. If the delete fails
    /// both objects exist and the delete error is returned.
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }

    /// Copies an object on the server side.
    ///
    /// Fails with [`Error::NotFound`] if the source does not exist.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Deletes the object at `path`. Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Deletes the directory marker of `path`.
    ///
    /// Objects below the directory are left in place.
    async fn delete_dir(&self, path: &str) -> Result<()>;

    /// Creates a directory by storing its marker object.
    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<UploadOutput>;

    /// Whether an object exists at `path`.
    async fn has(&self, path: &str) -> Result<bool> {
        Ok(self.get_metadata(path).await?.is_some())
    }

    /// Reads the whole object at `path`.
    async fn read(&self, path: &str) -> Result<Option<Bytes>>;

    /// Opens the object at `path` for streaming.
    async fn read_stream(&self, path: &str) -> Result<Option<ObjectReader>>;

    /// Collects the entries below `directory`.
    ///
    /// With `recursive` unset only direct children are returned.
    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<ListingEntry>> {
        self.list_contents_stream(directory, recursive)
            .try_collect()
            .await
    }

    /// Streams the entries below `directory`, fetching pages on demand.
    fn list_contents_stream(
        &self,
        directory: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<ListingEntry>>;

    /// Metadata of the object at `path`.
    async fn get_metadata(&self, path: &str) -> Result<Option<ObjectMetadata>>;

    /// Size in bytes of the object at `path`.
    async fn get_size(&self, path: &str) -> Result<Option<u64>> {
        Ok(self.get_metadata(path).await?.map(|meta| meta.size))
    }

    /// MIME type of the object at `path`.
    async fn get_mimetype(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .get_metadata(path)
            .await?
            .and_then(|meta| meta.mimetype()))
    }

    /// Last modification time of the object at `path`, in epoch seconds.
    async fn get_timestamp(&self, path: &str) -> Result<Option<i64>> {
        Ok(self
            .get_metadata(path)
            .await?
            .and_then(|meta| meta.timestamp()))
    }

    /// Public URL of the object at `path`. Performs no request.
    fn get_url(&self, path: &str) -> String;
}

/// Normalizes a path that must name an object rather than the root.
fn object_key(path: &str) -> Result<ObjectKey> {
    let key = ObjectKey::normalize(path);
    if key.is_root() {
        return Err(Error::invalid_path(path, "path does not name an object"));
    }
    Ok(key)
}

/// Normalizes a directory path and returns it with its marker key.
fn directory_key(path: &str) -> Result<(ObjectKey, String)> {
    let key = ObjectKey::normalize(path);
    match key.directory_marker() {
        Some(marker) => Ok((key, marker)),
        None => Err(Error::invalid_path(path, "the root directory has no marker")),
    }
}

#[async_trait::async_trait]
impl StorageAdapter for ObjectStorageClient {
    #[tracing::instrument(
        target = TRACING_TARGET,
        skip(self, contents, options),
        fields(size = contents.len()),
        err
    )]
    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> Result<UploadOutput> {
        let key = object_key(path)?;
        self.upload(&key, key.as_str(), RequestBody::Bytes(contents), options)
            .await
    }

    #[tracing::instrument(target = TRACING_TARGET, skip(self, contents, options), err)]
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: &WriteOptions,
    ) -> Result<UploadOutput> {
        let key = object_key(path)?;
        self.upload(&key, key.as_str(), RequestBody::Stream(contents), options)
            .await
    }

    #[tracing::instrument(target = TRACING_TARGET, skip(self), err)]
    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source = object_key(from)?;
        let destination = object_key(to)?;
        self.copy_object(&source, &destination).await
    }

    #[tracing::instrument(target = TRACING_TARGET, skip(self), err)]
    async fn delete(&self, path: &str) -> Result<()> {
        let key = object_key(path)?;
        self.remove(key.as_str()).await
    }

    #[tracing::instrument(target = TRACING_TARGET, skip(self), err)]
    async fn delete_dir(&self, path: &str) -> Result<()> {
        let (_, marker) = directory_key(path)?;
        self.remove(&marker).await
    }

    #[tracing::instrument(target = TRACING_TARGET, skip(self, options), err)]
    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<UploadOutput> {
        let (key, marker) = directory_key(path)?;
        self.upload(&key, &marker, RequestBody::Empty, options)
            .await
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        let key = object_key(path)?;
        self.download(&key).await.optional()
    }

    async fn read_stream(&self, path: &str) -> Result<Option<ObjectReader>> {
        let key = object_key(path)?;
        self.open(&key).await.optional()
    }

    fn list_contents_stream(
        &self,
        directory: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<ListingEntry>> {
        self.list_entries(directory, recursive)
    }

    async fn get_metadata(&self, path: &str) -> Result<Option<ObjectMetadata>> {
        let key = object_key(path)?;
        self.fetch_metadata(&key).await.optional()
    }

    fn get_url(&self, path: &str) -> String {
        self.public_url(&ObjectKey::normalize(path))
    }
}

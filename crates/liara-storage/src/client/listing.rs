//! Paginated directory listings.

use std::collections::HashSet;

use async_stream::try_stream;
use futures::Stream;
use futures::stream::BoxStream;

use super::{ObjectStorageClient, TRACING_TARGET};
use crate::types::{DirectoryEmulator, ListingEntry, ObjectKey};
use crate::{Error, Result};

impl ObjectStorageClient {
    /// Lists the entries below `directory`, one page at a time.
    ///
    /// Pages are requested lazily as the stream is polled. Directories that
    /// only exist as key prefixes are synthesized, each exactly once.
    pub fn list_entries(
        &self,
        directory: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<ListingEntry>> {
        Box::pin(paginate(self.clone(), ObjectKey::normalize(directory), recursive))
    }
}

/// Drives the continuation-token loop for one listing.
fn paginate(
    client: ObjectStorageClient,
    root: ObjectKey,
    recursive: bool,
) -> impl Stream<Item = Result<ListingEntry>> + Send + 'static {
    try_stream! {
        let prefix = root.list_prefix();
        let mut emulator = DirectoryEmulator::new(root.clone(), recursive);
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0u32;

        loop {
            let page = client.fetch_page(&prefix, recursive, token.as_deref()).await?;
            pages += 1;

            let next = page
                .next_continuation_token
                .clone()
                .filter(|next| !next.is_empty());

            for entry in emulator.page_entries(page) {
                yield entry;
            }

            match next {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    Err::<(), _>(Error::transport(format!(
                        "listing of '{prefix}' revisited continuation token '{next}'"
                    )))?;
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            directory = %root,
            recursive,
            pages,
            "Listing completed"
        );
    }
}

//! Streaming reader for object bodies.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use tokio_util::io::StreamReader;

use crate::transport::{ByteStream, HttpResponse, check_length};
use crate::{Error, Result};

/// A lazily consumed object body.
///
/// Yields the same bytes as a buffered read. If the service declared a
/// `Content-Length` and the body ends early or runs long, the final item is
/// an [`Error::Transport`]. Dropping the reader releases the connection.
pub struct ObjectReader {
    body: ByteStream,
    expected: Option<u64>,
    received: u64,
    done: bool,
    content_type: Option<String>,
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("expected", &self.expected)
            .field("received", &self.received)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl ObjectReader {
    pub(crate) fn new(response: HttpResponse) -> Self {
        let expected = response.content_length();
        let content_type = response
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            body: response.body,
            expected,
            received: 0,
            done: false,
            content_type,
        }
    }

    /// Length declared by the service, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.expected
    }

    /// Content-type declared by the service, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Number of bytes yielded so far.
    pub fn bytes_read(&self) -> u64 {
        self.received
    }

    /// Reads the rest of the body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        let buffer = self
            .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;
        Ok(buffer.freeze())
    }

    /// Adapts the reader to [`tokio::io::AsyncRead`].
    pub fn into_async_read(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }
}

impl Stream for ObjectReader {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.body.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.received += chunk.len() as u64;
                if this.expected.is_some_and(|expected| this.received > expected) {
                    this.done = true;
                    return Poll::Ready(Some(Err(Error::transport(format!(
                        "body longer than declared {} bytes",
                        this.expected.unwrap_or_default()
                    )))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.done = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.done = true;
                match check_length(this.expected, this.received) {
                    Ok(()) => Poll::Ready(None),
                    Err(err) => Poll::Ready(Some(Err(err))),
                }
            }
        }
    }
}

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context as TaskContext, Poll};
use std::time::SystemTime;

use anyhow::{Result, bail};
use bytes::BytesMut;
use http::{HeaderMap, Method, StatusCode, Uri};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tracing::{trace, warn};

use crate::tls::TlsMetadata;

use super::{CacheState, Entry};

/// Metadata captured at admission time; becomes the [`Entry`] on commit.
#[derive(Debug)]
pub(crate) struct PendingEntry {
    pub key: String,
    pub uri: Uri,
    pub method: Method,
    pub status: StatusCode,
    pub status_line: String,
    pub headers: HeaderMap,
    pub tls: Option<TlsMetadata>,
    pub received_at: SystemTime,
}

/// Body sink for a response being admitted to the cache. The engine streams
/// the body in (writes are always ready; the buffer is in memory) and seals
/// the writer exactly once: [`commit`](EntryWriter::commit) on a clean end
/// of stream, [`abort`](EntryWriter::abort) on truncation or early close.
/// A writer dropped while still open counts as aborted.
pub struct EntryWriter {
    state: Arc<CacheState>,
    meta: Option<PendingEntry>,
    buf: BytesMut,
    declared_length: Option<u64>,
    completed: bool,
}

impl EntryWriter {
    pub(crate) fn new(
        state: Arc<CacheState>,
        meta: PendingEntry,
        declared_length: Option<u64>,
    ) -> Self {
        Self {
            state,
            meta: Some(meta),
            buf: BytesMut::new(),
            declared_length,
            completed: false,
        }
    }

    /// Body bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Seal the writer after a clean end of stream. The entry replaces any
    /// prior one for the URI atomically. Errors when the buffered body does
    /// not match the declared `Content-Length`; nothing is stored then and
    /// the write counts as aborted.
    pub fn commit(mut self) -> Result<()> {
        if let Some(declared) = self.declared_length
            && declared != self.buf.len() as u64
        {
            let buffered = self.buf.len();
            self.release();
            bail!("body ended after {buffered} bytes but Content-Length declared {declared}");
        }
        let Some(meta) = self.meta.take() else {
            bail!("cache writer already completed");
        };
        self.completed = true;
        let PendingEntry {
            key,
            uri,
            method,
            status,
            status_line,
            headers,
            tls,
            received_at,
        } = meta;
        let body = self.buf.split().freeze();
        trace!(uri = %uri, bytes = body.len(), "committing cache entry");
        let entry = Entry {
            uri,
            method,
            status,
            status_line,
            headers,
            body,
            tls,
            received_at,
        };
        self.state.store.insert(key, Arc::new(entry));
        self.state.success_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Discard the buffered body without storing anything.
    pub fn abort(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.meta = None;
        self.buf.clear();
        self.state.abort_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl AsyncWrite for EntryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Drop for EntryWriter {
    fn drop(&mut self) {
        if !self.completed {
            trace!("cache writer dropped before end of stream; discarding");
            self.release();
        }
    }
}

/// Caller-facing body stream that records everything it relays. Bytes the
/// caller reads or [`skip`](RecordingBody::skip)s all pass through the
/// writer, so the stored body is what the origin served, not what the
/// caller consumed. End of stream commits; an I/O error or dropping the
/// body early aborts.
pub struct RecordingBody<R> {
    inner: R,
    writer: Option<EntryWriter>,
}

impl<R> RecordingBody<R> {
    pub fn new(inner: R, writer: EntryWriter) -> Self {
        Self {
            inner,
            writer: Some(writer),
        }
    }
}

impl<R: AsyncRead + Unpin> RecordingBody<R> {
    /// Read and discard up to `n` bytes, returning how many were skipped.
    /// Stops early only at end of stream.
    pub async fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut scratch = [0u8; 8192];
        let mut remaining = n;
        while remaining > 0 {
            let limit = remaining.min(scratch.len() as u64) as usize;
            let read = self.read(&mut scratch[..limit]).await?;
            if read == 0 {
                break;
            }
            remaining -= read as u64;
        }
        Ok(n - remaining)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for RecordingBody<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let filled = buf.filled();
                if filled.len() == before {
                    if let Some(writer) = this.writer.take()
                        && let Err(err) = writer.commit()
                    {
                        warn!(error = %err, "discarding truncated cache entry");
                    }
                } else if let Some(writer) = this.writer.as_mut() {
                    writer.append(&filled[before..]);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => {
                if let Some(writer) = this.writer.take() {
                    writer.abort();
                }
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    use crate::cache::CacheState;

    fn pending(state: &Arc<CacheState>, uri: &str) -> PendingEntry {
        PendingEntry {
            key: uri.to_string(),
            uri: uri.parse().unwrap(),
            method: Method::GET,
            status: StatusCode::OK,
            status_line: "HTTP/1.1 200 OK".to_string(),
            headers: HeaderMap::new(),
            tls: None,
            received_at: state.clock.now(),
        }
    }

    #[tokio::test]
    async fn commit_stores_the_streamed_body() -> Result<()> {
        let state = CacheState::new_for_tests();
        let meta = pending(&state, "http://example.com/a");
        let mut writer = EntryWriter::new(state.clone(), meta, Some(11));

        writer.write_all(b"hello").await?;
        writer.write_all(b" world").await?;
        writer.commit()?;

        let entry = state.store.get("http://example.com/a").expect("entry stored");
        assert_eq!(entry.body.as_ref(), b"hello world");
        assert_eq!(state.success_count.load(Ordering::Relaxed), 1);
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 0);
        Ok(())
    }

    #[tokio::test]
    async fn commit_rejects_a_short_body() -> Result<()> {
        let state = CacheState::new_for_tests();
        let meta = pending(&state, "http://example.com/a");
        let mut writer = EntryWriter::new(state.clone(), meta, Some(32));

        writer.write_all(b"too short").await?;
        assert!(writer.commit().is_err());

        assert!(state.store.get("http://example.com/a").is_none());
        assert_eq!(state.success_count.load(Ordering::Relaxed), 0);
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn abort_discards_and_counts_once() -> Result<()> {
        let state = CacheState::new_for_tests();
        let meta = pending(&state, "http://example.com/a");
        let mut writer = EntryWriter::new(state.clone(), meta, None);
        writer.write_all(b"partial").await?;
        writer.abort();

        assert!(state.store.get("http://example.com/a").is_none());
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_an_open_writer_aborts() {
        let state = CacheState::new_for_tests();
        let meta = pending(&state, "http://example.com/a");
        let writer = EntryWriter::new(state.clone(), meta, None);
        drop(writer);
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 1);
        assert_eq!(state.success_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn recording_body_sees_skipped_bytes() -> Result<()> {
        let state = CacheState::new_for_tests();
        let payload = b"I love puppies but hate spiders";
        let meta = pending(&state, "http://example.com/pets");
        let writer = EntryWriter::new(state.clone(), meta, Some(payload.len() as u64));
        let mut body = RecordingBody::new(&payload[..], writer);

        let mut head = [0u8; 7];
        body.read_exact(&mut head).await?;
        assert_eq!(&head, b"I love ");
        assert_eq!(body.skip(17).await?, 17);
        let mut tail = [0u8; 7];
        body.read_exact(&mut tail).await?;
        assert_eq!(&tail, b"spiders");
        assert_eq!(body.read(&mut [0u8; 8]).await?, 0);

        let entry = state
            .store
            .get("http://example.com/pets")
            .expect("entry stored");
        assert_eq!(entry.body.as_ref(), payload.as_slice());
        assert_eq!(state.success_count.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn recording_body_dropped_early_aborts() -> Result<()> {
        let state = CacheState::new_for_tests();
        let payload = b"only partially consumed";
        let meta = pending(&state, "http://example.com/a");
        let writer = EntryWriter::new(state.clone(), meta, Some(payload.len() as u64));
        let mut body = RecordingBody::new(&payload[..], writer);

        let mut head = [0u8; 4];
        body.read_exact(&mut head).await?;
        drop(body);

        assert!(state.store.get("http://example.com/a").is_none());
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[tokio::test]
    async fn recording_body_propagates_errors_and_aborts() {
        struct FailAfter {
            data: &'static [u8],
            served: usize,
        }

        impl AsyncRead for FailAfter {
            fn poll_read(
                mut self: Pin<&mut Self>,
                _cx: &mut TaskContext<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                if self.served >= self.data.len() {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "origin disconnected",
                    )));
                }
                let chunk = &self.data[self.served..];
                let take = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..take]);
                self.served += take;
                Poll::Ready(Ok(()))
            }
        }

        let state = CacheState::new_for_tests();
        let meta = pending(&state, "http://example.com/a");
        let writer = EntryWriter::new(state.clone(), meta, Some(32));
        let mut body = RecordingBody::new(
            FailAfter {
                data: b"ABCDE",
                served: 0,
            },
            writer,
        );

        let mut bytes = Vec::new();
        let err = body.read_to_end(&mut bytes).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(state.abort_count.load(Ordering::Relaxed), 1);
        assert_eq!(state.success_count.load(Ordering::Relaxed), 0);
        assert!(state.store.get("http://example.com/a").is_none());
    }
}

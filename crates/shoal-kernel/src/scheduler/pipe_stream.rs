//! Bounded byte pipe joining two pipeline stages.
//!
//! ```text
//!   PipeWriter ──▶ [VecDeque<u8>, bounded] ──▶ PipeReader
//!                  ├── writer parks when full
//!                  ├── reader parks when empty
//!                  ├── writer dropped → reader sees EOF once drained
//!                  └── reader dropped → writer gets BrokenPipe
//! ```
//!
//! The buffer sits behind a `std::sync::Mutex`: critical sections are a
//! handful of `VecDeque` operations, and `Drop` must stay synchronous.
//! Wakers are registered under the same lock so a wakeup cannot be lost
//! between "buffer is empty" and "park".

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Default pipe capacity, the Linux kernel's default pipe size.
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;

struct Buffer {
    bytes: VecDeque<u8>,
    capacity: usize,
    reader_waker: Option<Waker>,
    writer_waker: Option<Waker>,
}

struct Shared {
    buffer: Mutex<Buffer>,
    writer_gone: AtomicBool,
    reader_gone: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Writing end of a pipe.
pub struct PipeWriter {
    shared: Arc<Shared>,
}

/// Reading end of a pipe.
pub struct PipeReader {
    shared: Arc<Shared>,
}

/// Create a pipe holding at most `capacity` unread bytes.
pub fn pipe_stream(capacity: usize) -> (PipeWriter, PipeReader) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        buffer: Mutex::new(Buffer {
            bytes: VecDeque::with_capacity(capacity.min(8192)),
            capacity,
            reader_waker: None,
            writer_waker: None,
        }),
        writer_gone: AtomicBool::new(false),
        reader_gone: AtomicBool::new(false),
    });
    (
        PipeWriter {
            shared: shared.clone(),
        },
        PipeReader { shared },
    )
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed")
}

impl PipeWriter {
    /// Write some of `data`, waiting while the pipe is full.
    ///
    /// Returns how many bytes were accepted.
    pub async fn write_bytes(&self, data: &[u8]) -> io::Result<usize> {
        std::future::poll_fn(|cx| self.poll_write_bytes(cx, data)).await
    }

    /// Write all of `data`, waiting for the reader as needed.
    pub async fn write_all_bytes(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let n = self.write_bytes(data).await?;
            data = &data[n..];
        }
        Ok(())
    }

    fn poll_write_bytes(&self, cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<usize>> {
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let mut buffer = self.shared.lock();
        if self.shared.reader_gone.load(Ordering::Acquire) {
            return Poll::Ready(Err(broken_pipe()));
        }
        let room = buffer.capacity.saturating_sub(buffer.bytes.len());
        if room == 0 {
            buffer.writer_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let n = room.min(data.len());
        buffer.bytes.extend(&data[..n]);
        if let Some(waker) = buffer.reader_waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.poll_write_bytes(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shared.writer_gone.store(true, Ordering::Release);
        if let Some(waker) = self.shared.lock().reader_waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.writer_gone.store(true, Ordering::Release);
        if let Some(waker) = self.shared.lock().reader_waker.take() {
            waker.wake();
        }
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let mut buffer = self.shared.lock();
        if buffer.bytes.is_empty() {
            if self.shared.writer_gone.load(Ordering::Acquire) {
                // EOF: leave `buf` untouched.
                return Poll::Ready(Ok(()));
            }
            buffer.reader_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let n = buf.remaining().min(buffer.bytes.len());
        let (front, back) = buffer.bytes.as_slices();
        if n <= front.len() {
            buf.put_slice(&front[..n]);
        } else {
            buf.put_slice(front);
            buf.put_slice(&back[..n - front.len()]);
        }
        buffer.bytes.drain(..n);
        if let Some(waker) = buffer.writer_waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.reader_gone.store(true, Ordering::Release);
        if let Some(waker) = self.shared.lock().writer_waker.take() {
            waker.wake();
        }
    }
}

impl std::fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeWriter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn bytes_arrive_in_order() {
        let (writer, mut reader) = pipe_stream(1024);
        writer.write_all_bytes(b"hello").await.unwrap();
        drop(writer);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn small_buffer_applies_backpressure_without_loss() {
        let (writer, mut reader) = pipe_stream(16);
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();

        let task = tokio::spawn(async move {
            writer.write_all_bytes(&data).await.unwrap();
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        task.await.unwrap();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn dropping_reader_breaks_blocked_writer() {
        let (writer, reader) = pipe_stream(8);
        let task = tokio::spawn(async move { writer.write_all_bytes(&[0u8; 1024]).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(reader);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("writer hung after reader dropped")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn dropping_writer_wakes_parked_reader() {
        let (writer, mut reader) = pipe_stream(64);
        let task = tokio::spawn(async move {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).await.unwrap();
            out
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(writer);

        let out = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("reader hung after writer dropped")
            .unwrap();
        assert!(out.is_empty());
    }
}

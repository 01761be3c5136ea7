//! Ports and the channels behind them.
//!
//! A port is one slot in an evaluator's I/O table (0 stdin, 1 stdout,
//! 2 stderr, higher indices by redirection). Each port wraps a `Channel`
//! plus a flag saying whether this evaluator is responsible for closing it.
//! Channels are cheap to clone; clones refer to the same underlying stream.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::scheduler::pipe_stream::{PipeReader, PipeWriter};

/// A closable stream handle shared by every port that refers to it.
pub struct Handle<T> {
    inner: tokio::sync::Mutex<Option<T>>,
    closed: AtomicBool,
}

impl<T> Handle<T> {
    pub fn new(inner: T) -> Arc<Self> {
        Arc::new(Self {
            inner: tokio::sync::Mutex::new(Some(inner)),
            closed: AtomicBool::new(false),
        })
    }

    /// Take the stream out, leaving the handle closed.
    async fn take(&self) -> Option<T> {
        self.closed.store(true, Ordering::Release);
        self.inner.lock().await.take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    read_pos: usize,
    closed: bool,
}

/// In-memory byte buffer; used for output capture and in tests.
///
/// Reads consume from the front and report EOF once caught up with the
/// writes; they never wait.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    state: Mutex<MemoryState>,
}

impl MemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A buffer pre-filled with `data`, ready to be read.
    pub fn with_input(data: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MemoryState {
                data: data.into(),
                ..MemoryState::default()
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(closed_error());
        }
        state.data.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut state = self.lock();
        let start = state.read_pos;
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        state.read_pos += n;
        n
    }

    fn close(&self) -> bool {
        let mut state = self.lock();
        !std::mem::replace(&mut state.closed, true)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Everything written so far, read or not.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.lock().data).into_owned()
    }
}

/// Where a port's bytes go or come from.
#[derive(Clone)]
pub enum Channel {
    /// The host process's standard streams. Never closed by shoal.
    Stdin,
    Stdout,
    Stderr,
    File(Arc<Handle<tokio::fs::File>>),
    PipeReader(Arc<Handle<PipeReader>>),
    PipeWriter(Arc<Handle<PipeWriter>>),
    Memory(Arc<MemoryChannel>),
}

fn not_readable(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{what} is not readable"))
}

fn not_writable(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{what} is not writable"))
}

/// Writing through a handle closed on this side. Distinct from the
/// `BrokenPipe` a writer gets when the reader has gone.
fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel closed")
}

impl Channel {
    pub fn file(file: tokio::fs::File) -> Self {
        Channel::File(Handle::new(file))
    }

    pub fn pipe_reader(reader: PipeReader) -> Self {
        Channel::PipeReader(Handle::new(reader))
    }

    pub fn pipe_writer(writer: PipeWriter) -> Self {
        Channel::PipeWriter(Handle::new(writer))
    }

    /// Short name for listings and error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Channel::Stdin => "stdin",
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
            Channel::File(_) => "file",
            Channel::PipeReader(_) => "pipe (read)",
            Channel::PipeWriter(_) => "pipe (write)",
            Channel::Memory(_) => "memory",
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Channel::Stdin | Channel::Stdout | Channel::Stderr => false,
            Channel::File(h) => h.is_closed(),
            Channel::PipeReader(h) => h.is_closed(),
            Channel::PipeWriter(h) => h.is_closed(),
            Channel::Memory(m) => m.is_closed(),
        }
    }

    /// True when both values refer to the same underlying stream.
    pub fn same_as(&self, other: &Channel) -> bool {
        match (self, other) {
            (Channel::Stdin, Channel::Stdin)
            | (Channel::Stdout, Channel::Stdout)
            | (Channel::Stderr, Channel::Stderr) => true,
            (Channel::File(a), Channel::File(b)) => Arc::ptr_eq(a, b),
            (Channel::PipeReader(a), Channel::PipeReader(b)) => Arc::ptr_eq(a, b),
            (Channel::PipeWriter(a), Channel::PipeWriter(b)) => Arc::ptr_eq(a, b),
            (Channel::Memory(a), Channel::Memory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        match self {
            Channel::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(data).await?;
                out.flush().await
            }
            Channel::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(data).await?;
                err.flush().await
            }
            Channel::File(h) => {
                let mut guard = h.inner.lock().await;
                let file = guard.as_mut().ok_or_else(closed_error)?;
                file.write_all(data).await?;
                file.flush().await
            }
            Channel::PipeWriter(h) => {
                let guard = h.inner.lock().await;
                let writer = guard.as_ref().ok_or_else(closed_error)?;
                writer.write_all_bytes(data).await
            }
            Channel::Memory(m) => m.write(data),
            Channel::Stdin | Channel::PipeReader(_) => Err(not_writable(self.describe())),
        }
    }

    /// Read up to `buf.len()` bytes. Zero means end of input.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Channel::Stdin => tokio::io::stdin().read(buf).await,
            Channel::File(h) => {
                let mut guard = h.inner.lock().await;
                let file = guard.as_mut().ok_or_else(closed_error)?;
                file.read(buf).await
            }
            Channel::PipeReader(h) => {
                let mut guard = h.inner.lock().await;
                match guard.as_mut() {
                    Some(reader) => reader.read(buf).await,
                    None => Ok(0),
                }
            }
            Channel::Memory(m) => Ok(m.read(buf)),
            Channel::Stdout | Channel::Stderr | Channel::PipeWriter(_) => {
                Err(not_readable(self.describe()))
            }
        }
    }

    pub async fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 8192];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Close the underlying stream.
    ///
    /// Returns true if this call did the closing, false if it was already
    /// closed or is a host stream.
    pub async fn close(&self) -> io::Result<bool> {
        match self {
            Channel::Stdin | Channel::Stdout | Channel::Stderr => Ok(false),
            Channel::File(h) => match h.take().await {
                Some(mut file) => {
                    file.flush().await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            Channel::PipeReader(h) => Ok(h.take().await.is_some()),
            Channel::PipeWriter(h) => Ok(h.take().await.is_some()),
            Channel::Memory(m) => Ok(m.close()),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel({})", self.describe())
    }
}

/// One slot of an evaluator's port table.
#[derive(Debug, Clone)]
pub struct Port {
    pub channel: Channel,
    /// Whether the holder must close `channel` when it is done with it.
    pub owns_close: bool,
}

impl Port {
    /// A port whose holder is responsible for closing the channel.
    pub fn owned(channel: Channel) -> Self {
        Self {
            channel,
            owns_close: true,
        }
    }

    /// A port whose channel belongs to someone else.
    pub fn borrowed(channel: Channel) -> Self {
        Self {
            channel,
            owns_close: false,
        }
    }

    /// Close the channel if this port owns it. Clears the ownership flag so
    /// a second call is a no-op.
    pub async fn close(&mut self) -> bool {
        if !self.owns_close {
            return false;
        }
        self.owns_close = false;
        match self.channel.close().await {
            Ok(closed) => {
                tracing::trace!(channel = self.channel.describe(), closed, "port closed");
                closed
            }
            Err(e) => {
                tracing::warn!(channel = self.channel.describe(), error = %e, "failed to close port");
                false
            }
        }
    }
}

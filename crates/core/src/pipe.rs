//! In-memory pipe between a body producer and the request consuming it
//!
//! The writer end implements [`AsyncWrite`]; the reader end is a [`Stream`]
//! of byte chunks suitable as a request body. A bounded handoff buffer sits in
//! between, so a fast producer waits for the consumer instead of growing memory.
//!
//! Closing rules:
//! - `shutdown()` on the writer ends the stream cleanly.
//! - dropping the writer without `shutdown()`, or [`PipeWriter::close_with_error`],
//!   makes the reader yield an error, never a clean end of stream.
//! - dropping the reader, or calling [`PipeCloser::close`], fails every
//!   pending and future write with `BrokenPipe`.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use parking_lot::Mutex;
use tokio::io::AsyncWrite;

/// Default handoff buffer size: 64 KiB
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
enum WriterState {
    Open,
    Closed,
    Failed(io::ErrorKind, String),
}

#[derive(Debug)]
struct State {
    buffer: BytesMut,
    capacity: usize,
    writer: WriterState,
    reader_closed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl State {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }

    fn fail_writer(&mut self, kind: io::ErrorKind, message: String) {
        if matches!(self.writer, WriterState::Open) {
            self.writer = WriterState::Failed(kind, message);
        }
        self.wake_reader();
    }
}

type Shared = Arc<Mutex<State>>;

/// Create a pipe whose buffer holds at most `capacity` bytes (minimum 1)
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Mutex::new(State {
        buffer: BytesMut::with_capacity(capacity),
        capacity,
        writer: WriterState::Open,
        reader_closed: false,
        read_waker: None,
        write_waker: None,
    }));

    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

/// Write end of a [`pipe`]
#[derive(Debug)]
pub struct PipeWriter {
    shared: Shared,
}

impl PipeWriter {
    /// Close the write end so the reader observes `err` instead of end of stream
    pub fn close_with_error(self, err: io::Error) {
        self.shared.lock().fail_writer(err.kind(), err.to_string());
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.shared.lock();

        if state.reader_closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader closed",
            )));
        }
        if !matches!(state.writer, WriterState::Open) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write on closed pipe",
            )));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let room = state.capacity.saturating_sub(state.buffer.len());
        if room == 0 {
            state.write_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = room.min(buf.len());
        state.buffer.extend_from_slice(&buf[..n]);
        state.wake_reader();
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.shared.lock().reader_closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader closed",
            )));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.shared.lock();
        if matches!(state.writer, WriterState::Open) {
            state.writer = WriterState::Closed;
        }
        state.wake_reader();
        Poll::Ready(Ok(()))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.lock().fail_writer(
            io::ErrorKind::UnexpectedEof,
            "pipe writer dropped before close".to_string(),
        );
    }
}

/// Read end of a [`pipe`], yielding the written bytes as chunks
#[derive(Debug)]
pub struct PipeReader {
    shared: Shared,
}

impl PipeReader {
    /// Handle that can close this read end after the reader itself was handed off
    pub fn closer(&self) -> PipeCloser {
        PipeCloser {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self.shared.lock();

        if state.reader_closed {
            return Poll::Ready(None);
        }
        if !state.buffer.is_empty() {
            let chunk = state.buffer.split().freeze();
            state.wake_writer();
            return Poll::Ready(Some(Ok(chunk)));
        }

        match std::mem::replace(&mut state.writer, WriterState::Closed) {
            WriterState::Closed => Poll::Ready(None),
            WriterState::Failed(kind, message) => {
                Poll::Ready(Some(Err(io::Error::new(kind, message))))
            }
            WriterState::Open => {
                state.writer = WriterState::Open;
                state.read_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        close_reader(&self.shared);
    }
}

/// Closes the read end of a pipe from outside the reader
#[derive(Debug, Clone)]
pub struct PipeCloser {
    shared: Shared,
}

impl PipeCloser {
    /// Close the read end; blocked and future writes fail with `BrokenPipe`
    pub fn close(&self) {
        close_reader(&self.shared);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().reader_closed
    }
}

fn close_reader(shared: &Shared) {
    let mut state = shared.lock();
    state.reader_closed = true;
    state.buffer.clear();
    state.wake_writer();
}

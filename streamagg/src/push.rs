//! Push adapter: the aggregate drives itself into a writable sink
//!
//! The driver is a single task on the event loop. A sink is "ready" when its
//! `AsyncWrite::write` completes; the driver then reads one chunk from the
//! aggregate into its buffer and offers it to the sink. A short write leaves a
//! remainder which is written before the aggregate is asked for anything else,
//! so at most one buffer of data is ever in flight.
//!
//! ```text
//!   ┌───────────┐ read_into  ┌─────────┐  write().await  ┌──────┐
//!   │ Aggregate │──────────▶ │ buffer  │ ──────────────▶ │ sink │
//!   └───────────┘ (only when └─────────┘  (remainder      └──────┘
//!                  drained)                kept pending)
//! ```
//!
//! When the driver stops, for whatever reason, it closes the aggregate exactly
//! once. Read and write failures are recorded on the aggregate first, so the
//! caller can find them through `Aggregate::error`. A driver that is dropped
//! unfinished (aborted task, lost `select!`, timeout) closes it on drop.
//!
//! `Aggregate::close` wakes a driver blocked in a write; the write is abandoned
//! and the sink may have taken part of the pending chunk.

use std::fmt;
use std::io;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::aggregate::Engine;
use crate::error::{AggregateError, StateError};

/// Driver returned by `Aggregate::open_for_output_to`
pub struct PushAdapter<W> {
    engine: Arc<Mutex<Engine>>,
    closed: Arc<Notify>,
    sink: W,
    buffer: Vec<u8>,
    /// Bytes of `buffer` read from the aggregate but not yet accepted by the sink
    pending: Range<usize>,
    close_sink: bool,
    written: u64,
}

impl<W> PushAdapter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(engine: Arc<Mutex<Engine>>, sink: W) -> Self {
        let (closed, config) = {
            let engine = engine.lock();
            (engine.close_signal(), engine.config().clone())
        };
        Self {
            engine,
            closed,
            sink,
            buffer: vec![0; config.buffer_size],
            pending: 0..0,
            close_sink: config.close_sink_on_finish,
            written: 0,
        }
    }

    /// Override whether the sink is shut down after the last source is drained
    #[must_use]
    pub fn close_sink_on_finish(mut self, close: bool) -> Self {
        self.close_sink = close;
        self
    }

    /// Drive the aggregate into the sink until it is drained, fails, or is closed.
    ///
    /// Returns the number of bytes the sink accepted.
    ///
    /// # Errors
    /// - `Read` if a source failed
    /// - `Write` if the sink failed or accepted zero bytes
    /// - `StateError::Closed` if the aggregate was closed while running
    pub async fn run(mut self) -> Result<u64, AggregateError> {
        let outcome = match self.pump().await {
            Ok(()) if self.close_sink => {
                let closed = Arc::clone(&self.closed);
                tokio::select! {
                    biased;
                    () = closed.notified() => Err(StateError::Closed.into()),
                    result = self.sink.shutdown() => result.map_err(AggregateError::write),
                }
            }
            other => other,
        };

        {
            let mut engine = self.engine.lock();
            if let Err(err) = &outcome {
                if err.is_streaming() {
                    engine.record_error(err.clone());
                }
            }
            engine.close();
        }
        debug!(bytes = self.written, ok = outcome.is_ok(), "push driver finished");

        outcome.map(|()| self.written)
    }

    /// Run the driver as a task on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<u64, AggregateError>>
    where
        W: Send + 'static,
    {
        tokio::spawn(self.run())
    }

    async fn pump(&mut self) -> Result<(), AggregateError> {
        loop {
            if self.pending.is_empty() {
                let n = {
                    let mut engine = self.engine.lock();
                    engine.read_into(&mut self.buffer)?
                };
                if n == 0 {
                    trace!(bytes = self.written, "aggregate drained");
                    return Ok(());
                }
                self.pending = 0..n;
            }

            let closed = Arc::clone(&self.closed);
            let chunk = self.buffer.get(self.pending.clone()).unwrap_or_default();
            let n = tokio::select! {
                biased;
                () = closed.notified() => return Err(StateError::Closed.into()),
                result = self.sink.write(chunk) => result.map_err(AggregateError::write)?,
            };
            if n == 0 {
                return Err(AggregateError::write(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                )));
            }
            self.pending.start += n;
            self.written += n as u64;
            trace!(bytes = n, remaining = self.pending.len(), "chunk written");

            // Give other tasks on the loop a turn between chunks
            tokio::task::yield_now().await;
        }
    }
}

impl<W> fmt::Debug for PushAdapter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PushAdapter(buffer={}, pending={:?}, written={}, close_sink={})",
            self.buffer.len(),
            self.pending,
            self.written,
            self.close_sink
        )
    }
}

impl<W> Drop for PushAdapter<W> {
    fn drop(&mut self) {
        let mut engine = self.engine.lock();
        if !engine.is_closed() {
            debug!(bytes = self.written, "push driver dropped unfinished");
            engine.close();
        }
    }
}

//! Readers and sinks with observable behaviour, shared by the integration tests

#![allow(dead_code)]

use std::io::{self, Cursor, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// What happened to a reader after it was handed to an aggregate
#[derive(Clone, Default)]
pub struct Probe {
    reads: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Probe {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// In-memory reader that reports reads and its own drop
pub struct TrackedReader {
    inner: Cursor<Vec<u8>>,
    probe: Probe,
}

impl TrackedReader {
    pub fn new(data: &[u8]) -> (Self, Probe) {
        let probe = Probe::default();
        let reader = Self {
            inner: Cursor::new(data.to_vec()),
            probe: probe.clone(),
        };
        (reader, probe)
    }
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}

/// Reader whose every read fails
pub struct FailingReader {
    probe: Probe,
}

impl FailingReader {
    pub fn new() -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::Other, "injected read failure"))
    }
}

impl Drop for FailingReader {
    fn drop(&mut self) {
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}

/// Sink that accepts at most `max_write` bytes per call, and fails once `limit`
/// bytes have been accepted (if a limit is set)
#[derive(Default)]
pub struct TestSink {
    pub data: Vec<u8>,
    pub max_write: Option<usize>,
    pub limit: Option<usize>,
    pub writes: usize,
    pub shut_down: bool,
}

impl TestSink {
    pub fn trickle(max_write: usize) -> Self {
        Self {
            max_write: Some(max_write),
            ..Self::default()
        }
    }

    pub fn failing_after(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl AsyncWrite for TestSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.writes += 1;
        let mut n = buf.len();
        if let Some(limit) = this.limit {
            if this.data.len() >= limit {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "injected write failure",
                )));
            }
            n = n.min(limit - this.data.len());
        }
        if let Some(max_write) = this.max_write {
            n = n.min(max_write);
        }
        this.data.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().shut_down = true;
        Poll::Ready(Ok(()))
    }
}

/// Sink that never accepts a byte
pub struct ZeroSink;

impl AsyncWrite for ZeroSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(0))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink whose writes never complete
pub struct StuckSink;

impl AsyncWrite for StuckSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

/// Drain a pull reader using reads of at most `chunk` bytes
pub fn read_in_chunks(reader: &mut streamagg::AggregateReader, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        assert!(n <= chunk);
        out.extend_from_slice(&buf[..n]);
    }
}

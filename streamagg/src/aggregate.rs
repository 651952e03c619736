//! Aggregate - one logical stream over an ordered list of sources
//!
//! # Lifecycle
//!
//! ```text
//!  Building ──open_for_input_stream / open_for_output_to──▶ Open(mode) ──close──▶ Closed
//!     │                                                                            ▲
//!     └──────────────────────────────close─────────────────────────────────────────┘
//! ```
//!
//! Sources are only appended while building. Opening fixes the list and picks the
//! one adapter (pull or push) that will drain it. The first streaming failure is
//! recorded and sticks for the lifetime of the aggregate; no later source is
//! touched after it.
//!
//! # Sharing
//!
//! The engine sits behind `Arc<parking_lot::Mutex<_>>`, the same way pipe readers
//! and writers share their buffer. Adapters hold their own reference, so a push
//! driver can be spawned while the caller keeps the `Aggregate` to inspect
//! `error()` afterwards. There is still exactly one consumer: the lock is never
//! contended in normal use.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::AggregateConfig;
use crate::error::{AggregateError, StateError};
use crate::length::Length;
use crate::pull::AggregateReader;
use crate::push::PushAdapter;
use crate::source::{BufferSource, ByteSource, Source, TextEncoding};

/// Which adapter drains the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pull,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Open(Mode),
    Closed,
}

/// Shared state behind every `Aggregate` handle and adapter
pub(crate) struct Engine {
    sources: Vec<Source>,
    length: Length,
    phase: Phase,
    /// Index of the source being drained
    current: usize,
    /// Whether `sources[current]` has been opened
    current_opened: bool,
    error: Option<AggregateError>,
    config: AggregateConfig,
    /// Signalled on close, so a push driver stuck in a write can stop
    close_signal: Arc<Notify>,
    bytes_delivered: u64,
}

impl Engine {
    fn new(config: AggregateConfig) -> Self {
        Self {
            sources: Vec::new(),
            length: Length::Known(0),
            phase: Phase::Building,
            current: 0,
            current_opened: false,
            error: None,
            config,
            close_signal: Arc::new(Notify::new()),
            bytes_delivered: 0,
        }
    }

    fn add_source(&mut self, source: Source) -> Result<(), AggregateError> {
        match self.phase {
            Phase::Building => {}
            Phase::Open(_) => return Err(StateError::AlreadyOpen.into()),
            Phase::Closed => return Err(StateError::Closed.into()),
        }
        self.length = self.length + source.length();
        trace!(index = self.sources.len(), source = ?source, total = %self.length, "source added");
        self.sources.push(source);
        Ok(())
    }

    fn open(&mut self, mode: Mode) -> Result<(), AggregateError> {
        match self.phase {
            Phase::Building => {}
            Phase::Open(_) => return Err(StateError::AlreadyOpen.into()),
            Phase::Closed => return Err(StateError::Closed.into()),
        }
        self.phase = Phase::Open(mode);
        debug!(?mode, sources = self.sources.len(), length = %self.length, "aggregate opened");
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub(crate) fn config(&self) -> &AggregateConfig {
        &self.config
    }

    pub(crate) fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.close_signal)
    }

    /// Record a streaming failure. The first one wins.
    pub(crate) fn record_error(&mut self, err: AggregateError) {
        if self.error.is_none() {
            warn!(error = %err, "aggregate failed");
            self.error = Some(err);
        } else {
            trace!(error = %err, "discarding later failure");
        }
    }

    /// Read the next chunk of the aggregate into `buf`.
    ///
    /// Exhausted sources are closed and skipped in a loop, so any number of empty
    /// sources costs no stack. A failing source is closed, the failure recorded, and
    /// nothing after it is opened.
    ///
    /// Returns `Ok(0)` at the end of the aggregate (or for an empty `buf`).
    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, AggregateError> {
        match self.phase {
            Phase::Open(_) => {}
            Phase::Building => return Err(StateError::NotOpen.into()),
            Phase::Closed => return Err(StateError::Closed.into()),
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(source) = self.sources.get_mut(self.current) {
            let index = self.current;
            let result = if self.current_opened {
                source.read(buf)
            } else {
                self.current_opened = true;
                trace!(index, ?source, "opening source");
                source.open().and_then(|()| source.read(buf))
            };

            match result {
                Ok(0) => {
                    trace!(index, "source exhausted");
                    source.close();
                    self.current += 1;
                    self.current_opened = false;
                }
                Ok(n) => {
                    self.bytes_delivered += n as u64;
                    trace!(index, bytes = n, "chunk read");
                    return Ok(n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    source.close();
                    let err = AggregateError::read(index, e);
                    self.record_error(err.clone());
                    return Err(err);
                }
            }
        }

        Ok(0)
    }

    pub(crate) fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        let start = self.current.min(self.sources.len());
        let mut released = 0usize;
        for source in self.sources.iter_mut().skip(start) {
            if !source.is_closed() {
                source.close();
                released += 1;
            }
        }
        self.phase = Phase::Closed;
        // Stores a permit if the driver is not waiting yet
        self.close_signal.notify_one();
        debug!(
            released,
            bytes = self.bytes_delivered,
            failed = self.error.is_some(),
            "aggregate closed"
        );
    }

    fn open_source_count(&self) -> usize {
        self.sources.iter().filter(|s| !s.is_closed()).count()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

/// An ordered composition of sources presented as one logical stream.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use streamagg::{Aggregate, TextEncoding};
///
/// let aggregate = Aggregate::new();
/// aggregate.add_buffer(b"AB".to_vec()).unwrap();
/// aggregate.add_buffer(Vec::new()).unwrap();
/// aggregate.add_string("CDE", TextEncoding::Utf8).unwrap();
///
/// let mut body = String::new();
/// aggregate.open_for_input_stream().unwrap().read_to_string(&mut body).unwrap();
/// assert_eq!(body, "ABCDE");
/// ```
pub struct Aggregate {
    engine: Arc<Mutex<Engine>>,
}

impl Aggregate {
    /// Create an empty aggregate with the default buffer size
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AggregateConfig::default())
    }

    /// Create an empty aggregate whose push buffer holds `buffer_size` bytes
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self::with_config(AggregateConfig::default().with_buffer_size(buffer_size))
    }

    #[must_use]
    pub fn with_config(mut config: AggregateConfig) -> Self {
        config.buffer_size = config.buffer_size.max(1);
        Self {
            engine: Arc::new(Mutex::new(Engine::new(config))),
        }
    }

    // ----------------------------------------------------------------
    // Build phase

    /// Append a source.
    ///
    /// # Errors
    /// `StateError` once the aggregate has been opened or closed.
    pub fn add_source(&self, source: Source) -> Result<(), AggregateError> {
        self.engine.lock().add_source(source)
    }

    /// # Errors
    /// `StateError` once the aggregate has been opened or closed.
    pub fn add_buffer(&self, data: impl Into<Vec<u8>>) -> Result<(), AggregateError> {
        self.add_source(Source::buffer(data))
    }

    /// # Errors
    /// `InvalidSource` if `text` cannot be encoded, `StateError` once opened.
    pub fn add_string(&self, text: &str, encoding: TextEncoding) -> Result<(), AggregateError> {
        self.add_source(Source::Buffer(BufferSource::from_text(text, encoding)?))
    }

    /// Append a file. Its size at this moment is its declared length.
    ///
    /// # Errors
    /// `InvalidSource` if the path does not name a readable regular file,
    /// `StateError` once opened. Either way the aggregate is unchanged.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<(), AggregateError> {
        self.ensure_building()?;
        self.add_source(Source::file(path)?)
    }

    /// Append a file given as a `file:` URL.
    ///
    /// # Errors
    /// `InvalidSource` for other URL schemes or invalid files, `StateError` once opened.
    pub fn add_file_url(&self, url: &Url) -> Result<(), AggregateError> {
        if url.scheme() != "file" {
            return Err(AggregateError::invalid(url.as_str(), "not a file URL"));
        }
        let path = url
            .to_file_path()
            .map_err(|()| AggregateError::invalid(url.as_str(), "URL has no local path"))?;
        self.add_file(path)
    }

    /// Append an already-open stream that will deliver `length` bytes
    ///
    /// # Errors
    /// `StateError` once the aggregate has been opened or closed.
    pub fn add_stream(
        &self,
        reader: impl Read + Send + 'static,
        length: u64,
    ) -> Result<(), AggregateError> {
        self.add_source(Source::stream(reader, Length::Known(length)))
    }

    /// Append an already-open stream of unknown length. The aggregate length
    /// becomes unknown for good.
    ///
    /// # Errors
    /// `StateError` once the aggregate has been opened or closed.
    pub fn add_stream_unknown_length(
        &self,
        reader: impl Read + Send + 'static,
    ) -> Result<(), AggregateError> {
        self.add_source(Source::stream(reader, Length::Unknown))
    }

    fn ensure_building(&self) -> Result<(), AggregateError> {
        match self.engine.lock().phase {
            Phase::Building => Ok(()),
            Phase::Open(_) => Err(StateError::AlreadyOpen.into()),
            Phase::Closed => Err(StateError::Closed.into()),
        }
    }

    // ----------------------------------------------------------------
    // Introspection

    /// Sum of declared lengths, or `Unknown` once any unknown-length source was added
    #[must_use]
    pub fn length(&self) -> Length {
        self.engine.lock().length
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.engine.lock().phase, Phase::Open(_))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.lock().is_closed()
    }

    /// Adapter the aggregate was opened with, if any
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        match self.engine.lock().phase {
            Phase::Open(mode) => Some(mode),
            Phase::Building | Phase::Closed => None,
        }
    }

    /// The first streaming failure, if any
    #[must_use]
    pub fn error(&self) -> Option<AggregateError> {
        self.engine.lock().error.clone()
    }

    /// Bytes handed out so far by the engine
    #[must_use]
    pub fn bytes_delivered(&self) -> u64 {
        self.engine.lock().bytes_delivered
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.engine.lock().sources.len()
    }

    /// Sources not yet closed
    #[must_use]
    pub fn open_source_count(&self) -> usize {
        self.engine.lock().open_source_count()
    }

    // ----------------------------------------------------------------
    // Read phase

    /// Open for pull-style reading.
    ///
    /// # Errors
    /// `StateError` if the aggregate was already opened (in either mode) or closed.
    pub fn open_for_input_stream(&self) -> Result<AggregateReader, AggregateError> {
        self.engine.lock().open(Mode::Pull)?;
        Ok(AggregateReader::new(Arc::clone(&self.engine)))
    }

    /// Open for push-style writing into `sink`. Nothing happens until the returned
    /// adapter is run or spawned; it closes the aggregate when it finishes.
    ///
    /// # Errors
    /// `StateError` if the aggregate was already opened (in either mode) or closed.
    pub fn open_for_output_to<W>(&self, sink: W) -> Result<PushAdapter<W>, AggregateError>
    where
        W: AsyncWrite + Unpin,
    {
        self.engine.lock().open(Mode::Push)?;
        Ok(PushAdapter::new(Arc::clone(&self.engine), sink))
    }

    /// Close every source not yet closed. Idempotent.
    /// A running push driver stops, abandoning any write still in flight.
    pub fn close(&self) {
        self.engine.lock().close();
    }

    /// Push everything into memory and return it.
    ///
    /// # Errors
    /// `StateError` if already opened, otherwise the first read failure.
    pub async fn collect(&self) -> Result<Vec<u8>, AggregateError> {
        let mut output = Vec::new();
        let adapter = self.open_for_output_to(&mut output)?;
        adapter.run().await?;
        Ok(output)
    }

    /// Blocking form of [`Aggregate::collect`] on a private current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    /// Same as `collect`, plus `Runtime` if the event loop cannot be created.
    pub fn all_output(&self) -> Result<Vec<u8>, AggregateError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| AggregateError::Runtime(Arc::new(e)))?;
        runtime.block_on(self.collect())
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = self.engine.lock();
        write!(
            f,
            "Aggregate(phase={:?}, sources={}, current={}, length={}, error={:?})",
            engine.phase,
            engine.sources.len(),
            engine.current,
            engine.length,
            engine.error
        )
    }
}

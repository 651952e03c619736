//! Error types for the aggregate and its adapters
//!
//! Add-time failures (`InvalidSource`) are returned to the caller and leave the
//! aggregate untouched. Streaming failures (`Read`, `Write`) are recorded once on
//! the aggregate and handed out again on every later read, so the error type is
//! `Clone` and keeps the underlying `io::Error` behind an `Arc`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Operation attempted in the wrong lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// A source was added, or a second adapter opened, after the aggregate was opened
    AlreadyOpen,
    /// An adapter was used before the aggregate was opened
    NotOpen,
    /// The aggregate has been closed and cannot be used again
    Closed,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::AlreadyOpen => write!(f, "aggregate is already open"),
            StateError::NotOpen => write!(f, "aggregate is not open"),
            StateError::Closed => write!(f, "aggregate is closed"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AggregateError {
    #[error("invalid source {origin}: {reason}")]
    InvalidSource {
        origin: String,
        reason: String,
        #[source]
        source: Option<Arc<io::Error>>,
    },

    #[error("read failed on source #{index}: {source}")]
    Read {
        index: usize,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("write to sink failed: {0}")]
    Write(#[source] Arc<io::Error>),

    #[error("{0}")]
    State(StateError),

    #[error("cannot start event loop: {0}")]
    Runtime(#[source] Arc<io::Error>),
}

impl AggregateError {
    pub(crate) fn invalid_path(path: PathBuf, err: io::Error) -> Self {
        AggregateError::InvalidSource {
            origin: path.display().to_string(),
            reason: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    pub(crate) fn invalid(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        AggregateError::InvalidSource {
            origin: origin.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn read(index: usize, err: io::Error) -> Self {
        AggregateError::Read {
            index,
            source: Arc::new(err),
        }
    }

    pub(crate) fn write(err: io::Error) -> Self {
        AggregateError::Write(Arc::new(err))
    }

    /// Streaming failures are the ones recorded on the aggregate
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, AggregateError::Read { .. } | AggregateError::Write(_))
    }

    /// `io::ErrorKind` of the underlying failure, if there is one
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            AggregateError::InvalidSource { source, .. } => source.as_ref().map(|e| e.kind()),
            AggregateError::Read { source, .. } => Some(source.kind()),
            AggregateError::Write(e) | AggregateError::Runtime(e) => Some(e.kind()),
            AggregateError::State(_) => None,
        }
    }
}

impl From<StateError> for AggregateError {
    fn from(e: StateError) -> Self {
        AggregateError::State(e)
    }
}

impl From<AggregateError> for io::Error {
    fn from(e: AggregateError) -> Self {
        let kind = match &e {
            AggregateError::InvalidSource { .. } => io::ErrorKind::InvalidInput,
            AggregateError::State(StateError::Closed) => io::ErrorKind::BrokenPipe,
            AggregateError::State(_) => io::ErrorKind::Other,
            AggregateError::Read { source, .. } => source.kind(),
            AggregateError::Write(source) | AggregateError::Runtime(source) => source.kind(),
        };
        io::Error::new(kind, e)
    }
}

impl embedded_io::Error for AggregateError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            AggregateError::InvalidSource { .. } => embedded_io::ErrorKind::InvalidInput,
            AggregateError::State(StateError::Closed) => embedded_io::ErrorKind::BrokenPipe,
            AggregateError::State(_) => embedded_io::ErrorKind::Other,
            AggregateError::Read { source, .. }
            | AggregateError::Write(source)
            | AggregateError::Runtime(source) => io_kind_to_embedded(source.kind()),
        }
    }
}

#[allow(clippy::match_same_arms)]
fn io_kind_to_embedded(kind: io::ErrorKind) -> embedded_io::ErrorKind {
    match kind {
        io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
        io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
        io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
        io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
        io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
        io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
        io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
        io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
        io::ErrorKind::WriteZero => embedded_io::ErrorKind::WriteZero,
        io::ErrorKind::ConnectionReset => embedded_io::ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => embedded_io::ErrorKind::ConnectionAborted,
        _ => embedded_io::ErrorKind::Other,
    }
}

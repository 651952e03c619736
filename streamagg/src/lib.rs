//! Stream aggregation: buffers, files and caller-supplied readers concatenated
//! into one logical stream, e.g. for a multipart request body.
//!
//! Build an [`Aggregate`], then drain it once, either by pulling
//! ([`Aggregate::open_for_input_stream`]) or by letting it push itself into a
//! sink ([`Aggregate::open_for_output_to`]).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod length;
pub mod pull;
pub mod push;
pub mod source;

// Re-export the aggregate for convenience
pub use aggregate::{Aggregate, Mode};

// Re-export adapters
pub use pull::AggregateReader;
pub use push::PushAdapter;

// Re-export source types
pub use source::{BufferSource, ByteSource, FileSource, Source, StreamSource, TextEncoding};

pub use config::{AggregateConfig, DEFAULT_BUFFER_SIZE};
pub use error::{AggregateError, StateError};
pub use length::Length;

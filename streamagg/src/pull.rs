//! Pull adapter: the aggregate as a blocking input stream
//!
//! Each `read` performs exactly one engine cycle (including skipping exhausted
//! sources) and never prefetches. After end of data it keeps returning 0; after a
//! failure it keeps returning the recorded error; after `close` it fails with
//! `StateError::Closed`.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::aggregate::Engine;
use crate::error::AggregateError;

/// Readable handle returned by `Aggregate::open_for_input_stream`.
///
/// Implements both `std::io::Read` and `embedded_io::Read`, so it can be handed
/// to anything that consumes a request body. Dropping the reader closes the
/// aggregate.
pub struct AggregateReader {
    engine: Arc<Mutex<Engine>>,
}

impl AggregateReader {
    pub(crate) fn new(engine: Arc<Mutex<Engine>>) -> Self {
        Self { engine }
    }

    /// Read the next chunk, at most `buf.len()` bytes.
    ///
    /// Returns:
    /// - Positive value: number of bytes read
    /// - 0: end of the aggregate (or empty `buf`)
    ///
    /// # Errors
    /// The sticky read failure, or `StateError::Closed` after `close`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, AggregateError> {
        self.engine.lock().read_into(buf)
    }

    /// Close the aggregate and release every remaining source. Idempotent.
    pub fn close(&mut self) {
        let mut engine = self.engine.lock();
        if !engine.is_closed() {
            engine.close();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.lock().is_closed()
    }
}

impl io::Read for AggregateReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        AggregateReader::read(self, buf).map_err(io::Error::from)
    }
}

impl embedded_io::ErrorType for AggregateReader {
    type Error = AggregateError;
}

impl embedded_io::Read for AggregateReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        AggregateReader::read(self, buf)
    }
}

impl fmt::Debug for AggregateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AggregateReader(closed={})", self.is_closed())
    }
}

impl Drop for AggregateReader {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

//! Byte sources that can be aggregated
//!
//! Every origin exposes the same small contract (`ByteSource`): open, read up to
//! `buf.len()` bytes, close. A read returning 0 means the source is exhausted.
//!
//! - `BufferSource`: owned bytes, never fails
//! - `FileSource`: validated at construction, opened lazily on first use
//! - `StreamSource`: any caller-supplied `std::io::Read`, errors surface verbatim

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::AggregateError;
use crate::length::Length;

/// Uniform read/close contract over every source origin
pub trait ByteSource {
    /// Prepare the origin for reading. No-op for origins that are always ready.
    ///
    /// # Errors
    /// Returns the OS error if the origin cannot be opened.
    fn open(&mut self) -> io::Result<()>;

    /// Read up to `buf.len()` bytes. `Ok(0)` signals exhaustion.
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the origin. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Text encodings accepted by `Aggregate::add_string`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// UTF-16 little endian, no byte order mark
    Utf16Le,
    /// UTF-16 big endian, no byte order mark
    Utf16Be,
    /// ISO-8859-1; rejects characters above U+00FF
    Latin1,
}

impl TextEncoding {
    /// Encode `text` into bytes.
    ///
    /// # Errors
    /// Returns `InvalidSource` if a character has no representation in the encoding.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, AggregateError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        AggregateError::invalid(
                            "string",
                            format!("character {c:?} is not representable in Latin-1"),
                        )
                    })
                })
                .collect(),
        }
    }
}

// --------------------------------------------------------------------
// In-memory buffer
//

pub struct BufferSource {
    data: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl BufferSource {
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            closed: false,
        }
    }

    /// # Errors
    /// Returns `InvalidSource` if the text cannot be encoded.
    pub fn from_text(text: &str, encoding: TextEncoding) -> Result<Self, AggregateError> {
        Ok(Self::new(encoding.encode(text)?))
    }

    #[must_use]
    pub fn length(&self) -> Length {
        Length::Known(self.data.len() as u64)
    }
}

impl ByteSource for BufferSource {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            log::warn!("BufferSource::read() called on closed source: {self:?}");
            return Ok(0);
        }
        let remaining = self.data.get(self.pos..).unwrap_or_default();
        let n = remaining.len().min(buf.len());
        // n is bounded by both slices
        #[allow(clippy::indexing_slicing)]
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.data = Vec::new();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for BufferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferSource(len={}, pos={}, closed={})",
            self.data.len(),
            self.pos,
            self.closed
        )
    }
}

// --------------------------------------------------------------------
// File
//

pub struct FileSource {
    path: PathBuf,
    size: u64,
    file: Option<File>,
    closed: bool,
}

impl FileSource {
    /// Validate `path` and record its current size.
    ///
    /// The file must exist, be a regular file and be readable. It is opened again
    /// when the aggregate reaches it.
    ///
    /// # Errors
    /// Returns `InvalidSource` if any of the checks fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AggregateError> {
        let path = path.as_ref().to_path_buf();
        let metadata =
            std::fs::metadata(&path).map_err(|e| AggregateError::invalid_path(path.clone(), e))?;
        if !metadata.is_file() {
            return Err(AggregateError::invalid(
                path.display().to_string(),
                "not a regular file",
            ));
        }
        // Readability probe; the handle is reopened lazily
        File::open(&path).map_err(|e| AggregateError::invalid_path(path.clone(), e))?;

        Ok(Self {
            path,
            size: metadata.len(),
            file: None,
            closed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn length(&self) -> Length {
        Length::Known(self.size)
    }
}

impl ByteSource for FileSource {
    fn open(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "file source already closed",
            ));
        }
        if self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            log::warn!("FileSource::read() called on closed source: {self:?}");
            return Ok(0);
        }
        if self.file.is_none() {
            self.open()?;
        }
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }

    fn close(&mut self) {
        self.file = None;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileSource(path={}, size={}, opened={}, closed={})",
            self.path.display(),
            self.size,
            self.file.is_some(),
            self.closed
        )
    }
}

// --------------------------------------------------------------------
// Caller-supplied stream
//

pub struct StreamSource {
    reader: Option<Box<dyn Read + Send>>,
    length: Length,
}

impl StreamSource {
    /// Wrap an already-open reader. `length` is what the caller declares for it.
    pub fn new(reader: impl Read + Send + 'static, length: Length) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            length,
        }
    }

    #[must_use]
    pub fn length(&self) -> Length {
        self.length
    }
}

impl ByteSource for StreamSource {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => {
                log::warn!("StreamSource::read() called on closed source: {self:?}");
                Ok(0)
            }
        }
    }

    /// Drops the reader, which is how `std::io::Read` implementors release resources
    fn close(&mut self) {
        self.reader = None;
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamSource(length={}, closed={})",
            self.length,
            self.reader.is_none()
        )
    }
}

// --------------------------------------------------------------------
// Tagged variant
//

/// One origin of bytes within an aggregate
#[derive(Debug)]
pub enum Source {
    Buffer(BufferSource),
    File(FileSource),
    Stream(StreamSource),
}

impl Source {
    #[must_use]
    pub fn buffer(data: impl Into<Vec<u8>>) -> Self {
        Source::Buffer(BufferSource::new(data))
    }

    /// # Errors
    /// Returns `InvalidSource` if the file cannot be validated.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, AggregateError> {
        Ok(Source::File(FileSource::new(path)?))
    }

    pub fn stream(reader: impl Read + Send + 'static, length: Length) -> Self {
        Source::Stream(StreamSource::new(reader, length))
    }

    /// Declared length, fixed at construction
    #[must_use]
    pub fn length(&self) -> Length {
        match self {
            Source::Buffer(s) => s.length(),
            Source::File(s) => s.length(),
            Source::Stream(s) => s.length(),
        }
    }

    fn inner(&mut self) -> &mut dyn ByteSource {
        match self {
            Source::Buffer(s) => s,
            Source::File(s) => s,
            Source::Stream(s) => s,
        }
    }
}

impl ByteSource for Source {
    fn open(&mut self) -> io::Result<()> {
        self.inner().open()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner().read(buf)
    }

    fn close(&mut self) {
        self.inner().close();
    }

    fn is_closed(&self) -> bool {
        match self {
            Source::Buffer(s) => s.is_closed(),
            Source::File(s) => s.is_closed(),
            Source::Stream(s) => s.is_closed(),
        }
    }
}

//! Shared input sources
//!
//! A [`Source`] is a cloneable handle to a seekable byte stream. The stream that
//! owns it and the decoder reading from it hold clones of the same handle, so
//! closing it from the stream side is visible to the decoder.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Seekable byte stream that can be moved to the device thread
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Cloneable handle to a seekable input.
#[derive(Clone)]
pub struct Source {
    inner: Arc<Mutex<Option<Box<dyn ReadSeek>>>>,
    name: Arc<str>,
}

impl Source {
    /// Wrap any seekable reader.
    pub fn new<R: ReadSeek + 'static>(reader: R, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(reader)))),
            name: Arc::from(name),
        }
    }

    /// Open a file for reading.
    ///
    /// # Errors
    /// Returns [`Error::Open`] if the file cannot be opened.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Open(format!("Failed to open file {}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }

    /// In-memory source.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes), "<memory>")
    }

    /// A source with nothing behind it; every read fails.
    pub fn empty(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            inner: Arc::new(Mutex::new(None)),
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drop the underlying reader for every clone of this handle.
    pub fn close(&self) {
        if self.inner.lock().take().is_some() {
            debug!("Closed source {}", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Total length in bytes, leaving the read position unchanged.
    pub fn byte_len(&self) -> Option<u64> {
        let mut guard = self.inner.lock();
        let reader = guard.as_mut()?;
        let pos = reader.stream_position().ok()?;
        let len = reader.seek(SeekFrom::End(0)).ok()?;
        reader.seek(SeekFrom::Start(pos)).ok()?;
        Some(len)
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotConnected,
            format!("source {} is closed", self.name),
        )
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(self.closed_error()),
        }
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(reader) => reader.seek(pos),
            None => Err(self.closed_error()),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

//! In-memory source and sink.

use bytes::Bytes;

use pipecrypt_common::{Error, Library, Reason, Result};

use crate::chain::{Segment, SegmentRef, Stage};

enum Storage {
    Owned(Vec<u8>),
    Shared(Bytes),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(data) => data,
            Storage::Shared(data) => data,
        }
    }
}

/// Growable memory buffer, or a read-only view of existing bytes.
///
/// Reading consumes from the front. [`Stage::reset`] rewinds to the start
/// of the data, so everything written can be read again.
pub struct MemoryIo {
    storage: Storage,
    read_pos: usize,
}

impl MemoryIo {
    /// Empty growable buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Empty growable buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Storage::Owned(Vec::with_capacity(capacity)),
            read_pos: 0,
        }
    }

    /// Zero-copy read-only buffer over `data`. Writes fail.
    pub fn wrap(data: impl Into<Bytes>) -> Self {
        Self {
            storage: Storage::Shared(data.into()),
            read_pos: 0,
        }
    }

    /// Growable buffer holding a copy of `data`.
    pub fn copying(data: &[u8]) -> Self {
        Self {
            storage: Storage::Owned(data.to_vec()),
            read_pos: 0,
        }
    }

    /// The bytes not read yet.
    pub fn memory(&self) -> &[u8] {
        &self.storage.as_slice()[self.read_pos..]
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }

    /// Drop all data. A wrapped buffer becomes an empty growable one.
    pub fn clear(&mut self) {
        self.storage = Storage::Owned(Vec::new());
        self.read_pos = 0;
    }

    /// Take the unread bytes out of the buffer, leaving it empty.
    pub fn take(&mut self) -> Vec<u8> {
        let unread = self.memory().to_vec();
        self.clear();
        unread
    }
}

impl Default for MemoryIo {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MemoryIo {
    fn from(text: &str) -> Self {
        Self::copying(text.as_bytes())
    }
}

impl From<Vec<u8>> for MemoryIo {
    fn from(data: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(data),
            read_pos: 0,
        }
    }
}

impl From<Bytes> for MemoryIo {
    fn from(data: Bytes) -> Self {
        Self::wrap(data)
    }
}

impl Stage for MemoryIo {
    fn kind(&self) -> &'static str {
        "memory buffer"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        match &mut self.storage {
            Storage::Owned(buf) => {
                buf.extend_from_slice(data);
                Ok(data.len())
            }
            Storage::Shared(_) => Err(Error::io(Library::Bio, Reason::WriteToReadOnly)),
        }
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        let unread = self.memory();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.read_pos += n;
        Ok(n)
    }

    fn gets(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        let unread = self.memory();
        let limit = unread.len().min(buf.len());
        let n = match unread[..limit].iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => limit,
        };
        buf[..n].copy_from_slice(&unread[..n]);
        self.read_pos += n;
        Ok(n)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        self.read_pos = 0;
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.memory().is_empty()
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        self.memory().len()
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }
}

//! Buffering filter.

use pipecrypt_common::{Error, Result};

use crate::chain::{Segment, SegmentRef, Stage};
use crate::config::IoConfig;

/// Default and minimum buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Collects small writes into buffer-sized ones and serves small reads from
/// buffer-sized refills.
pub struct BufferFilter {
    size: usize,
    write_buf: Vec<u8>,
    read_buf: Vec<u8>,
    read_pos: usize,
}

impl BufferFilter {
    /// Buffer of `size` bytes, raised to [`DEFAULT_BUFFER_SIZE`] if smaller.
    pub fn new(size: usize) -> Self {
        let size = size.max(DEFAULT_BUFFER_SIZE);
        Self {
            size,
            write_buf: Vec::with_capacity(size),
            read_buf: Vec::new(),
            read_pos: 0,
        }
    }

    pub fn with_config(config: &IoConfig) -> Self {
        Self::new(config.buffer_size)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn unread(&self) -> &[u8] {
        &self.read_buf[self.read_pos..]
    }
}

impl Default for BufferFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl Stage for BufferFilter {
    fn kind(&self) -> &'static str {
        "buffer"
    }

    fn write(&mut self, data: &[u8], mut next: Segment<'_>) -> Result<usize> {
        if self.write_buf.len() + data.len() <= self.size {
            self.write_buf.extend_from_slice(data);
            return Ok(data.len());
        }

        next.drain(&mut self.write_buf)?;
        if self.write_buf.is_empty() && data.len() >= self.size {
            return next.write(data);
        }
        let room = self.size - self.write_buf.len();
        if room == 0 {
            return Err(Error::WouldBlock);
        }
        let n = room.min(data.len());
        self.write_buf.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        if self.unread().is_empty() {
            if buf.len() >= self.size {
                return next.read(buf);
            }
            self.read_buf.resize(self.size, 0);
            self.read_pos = 0;
            let n = match next.read(&mut self.read_buf) {
                Ok(n) => n,
                Err(err) => {
                    self.read_buf.clear();
                    return Err(err);
                }
            };
            self.read_buf.truncate(n);
        }
        let unread = self.unread();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.read_pos += n;
        Ok(n)
    }

    fn flush(&mut self, mut next: Segment<'_>) -> Result<()> {
        next.drain_all(&mut self.write_buf)?;
        next.flush()
    }

    fn reset(&mut self, mut next: Segment<'_>) -> Result<()> {
        self.write_buf.clear();
        self.read_buf.clear();
        self.read_pos = 0;
        next.reset()
    }

    fn eof(&self, next: SegmentRef<'_>) -> bool {
        self.unread().is_empty() && next.eof()
    }

    fn read_pending(&self, next: SegmentRef<'_>) -> usize {
        self.unread().len() + next.read_pending()
    }

    fn write_pending(&self, next: SegmentRef<'_>) -> usize {
        self.write_buf.len() + next.write_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::memory::MemoryIo;

    #[test]
    fn test_minimum_size() {
        assert_eq!(BufferFilter::new(16).size(), 4096);
        assert_eq!(BufferFilter::new(8192).size(), 8192);
        let config = IoConfig {
            buffer_size: 10_000,
            ..IoConfig::default()
        };
        assert_eq!(BufferFilter::with_config(&config).size(), 10_000);
    }

    #[test]
    fn test_writes_held_until_flush() {
        let mut chain = Chain::new(BufferFilter::default());
        let sink = chain.link(MemoryIo::new());
        chain.puts("held").unwrap();
        assert!(chain.get(sink).unwrap().memory().is_empty());
        assert_eq!(chain.write_pending(), 4);

        chain.flush().unwrap();
        assert_eq!(chain.get(sink).unwrap().memory(), b"held");
    }

    #[test]
    fn test_overflow_spills_downstream() {
        let mut chain = Chain::new(BufferFilter::default());
        let sink = chain.link(MemoryIo::new());
        let data = vec![3u8; 10_000];
        chain.write_all(&data).unwrap();
        chain.flush().unwrap();
        assert_eq!(chain.get(sink).unwrap().memory(), data.as_slice());
    }

    #[test]
    fn test_line_reads_through_buffer() {
        let mut chain = Chain::new(BufferFilter::default()).then(MemoryIo::from("a\nbb\nccc"));
        let mut line = [0u8; 16];
        let n = chain.gets(&mut line).unwrap();
        assert_eq!(&line[..n], b"a\n");
        assert_eq!(chain.read_pending(), 6);
        let n = chain.gets(&mut line).unwrap();
        assert_eq!(&line[..n], b"bb\n");
        let n = chain.gets(&mut line).unwrap();
        assert_eq!(&line[..n], b"ccc");
        assert!(chain.eof());
    }
}

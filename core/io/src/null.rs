//! Null source and sink.

use pipecrypt_common::Result;

use crate::chain::{Segment, SegmentRef, Stage};

/// Accepts and discards every write; reads return end of data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo;

impl NullIo {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for NullIo {
    fn kind(&self) -> &'static str {
        "NULL"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        Ok(data.len())
    }

    fn read(&mut self, _buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        Ok(0)
    }

    fn gets(&mut self, _buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        Ok(0)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        true
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;

    #[test]
    fn test_discards() {
        let mut chain = Chain::new(NullIo::new());
        assert_eq!(chain.write(b"anything").unwrap(), 8);
        let mut buf = [0u8; 4];
        assert_eq!(chain.read(&mut buf).unwrap(), 0);
        assert!(chain.eof());
        assert_eq!(chain.to_string(), "(NULL)");
    }
}

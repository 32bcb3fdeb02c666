//! Base64 filter: encodes on write, decodes on read.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::chain::{Segment, SegmentRef, Stage};
use crate::config::IoConfig;

/// Characters per output line when newlines are enabled.
pub const LINE_WIDTH: usize = 64;

const ENCODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_encode_padding(true),
);

const DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const READ_CHUNK: usize = 1024;

/// RFC 4648 base64 with the standard alphabet.
///
/// Written bytes are encoded in groups of three; [`Stage::flush`] encodes
/// the final partial group with padding. Read bytes are decoded from the
/// downstream source, skipping whitespace.
pub struct Base64Filter {
    newlines: bool,
    // encode side
    pending: Vec<u8>,
    outbox: Vec<u8>,
    column: usize,
    // decode side
    carry: Vec<u8>,
    decoded: Vec<u8>,
    decoded_pos: usize,
    finished: bool,
}

impl Base64Filter {
    /// Encoder without line breaks.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Encoder that breaks output every 64 characters and ends it with a
    /// newline.
    pub fn with_newlines() -> Self {
        Self::build(true)
    }

    pub fn with_config(config: &IoConfig) -> Self {
        Self::build(config.base64_newlines)
    }

    fn build(newlines: bool) -> Self {
        Self {
            newlines,
            pending: Vec::with_capacity(3),
            outbox: Vec::new(),
            column: 0,
            carry: Vec::new(),
            decoded: Vec::new(),
            decoded_pos: 0,
            finished: false,
        }
    }

    pub fn has_newlines(&self) -> bool {
        self.newlines
    }

    fn emit(&mut self, raw: &[u8]) {
        let encoded = ENCODER.encode(raw);
        if !self.newlines {
            self.outbox.extend_from_slice(encoded.as_bytes());
            return;
        }
        for &c in encoded.as_bytes() {
            self.outbox.push(c);
            self.column += 1;
            if self.column == LINE_WIDTH {
                self.outbox.push(b'\n');
                self.column = 0;
            }
        }
    }

    fn decode_carry(&mut self, final_group: bool) -> Result<()> {
        let usable = if final_group {
            self.carry.len()
        } else {
            self.carry.len() / 4 * 4
        };
        if usable == 0 {
            return Ok(());
        }
        self.decoded.drain(..self.decoded_pos);
        self.decoded_pos = 0;
        DECODER
            .decode_vec(&self.carry[..usable], &mut self.decoded)
            .map_err(|err| {
                tracing::debug!(%err, "base64 input rejected");
                Error::Io(CryptoError::with_detail(Library::Evp, Reason::DecodeError, err))
            })?;
        self.carry.drain(..usable);
        Ok(())
    }

    fn unread(&self) -> &[u8] {
        &self.decoded[self.decoded_pos..]
    }
}

impl Default for Base64Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Base64Filter {
    fn kind(&self) -> &'static str {
        "base64 encoding"
    }

    fn write(&mut self, data: &[u8], mut next: Segment<'_>) -> Result<usize> {
        next.drain(&mut self.outbox)?;
        if !self.outbox.is_empty() {
            return Err(Error::WouldBlock);
        }

        self.pending.extend_from_slice(data);
        let whole = self.pending.len() / 3 * 3;
        if whole > 0 {
            let groups: Vec<u8> = self.pending.drain(..whole).collect();
            self.emit(&groups);
        }
        next.drain(&mut self.outbox)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        while self.unread().is_empty() && !self.finished {
            let mut chunk = [0u8; READ_CHUNK];
            match next.read(&mut chunk)? {
                0 => {
                    self.decode_carry(true)?;
                    self.finished = true;
                }
                n => {
                    self.carry
                        .extend(chunk[..n].iter().filter(|b| !b.is_ascii_whitespace()));
                    self.decode_carry(false)?;
                }
            }
        }
        let unread = self.unread();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.decoded_pos += n;
        Ok(n)
    }

    fn flush(&mut self, mut next: Segment<'_>) -> Result<()> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.emit(&tail);
        }
        if self.newlines && self.column > 0 {
            self.outbox.push(b'\n');
            self.column = 0;
        }
        next.drain_all(&mut self.outbox)?;
        next.flush()
    }

    fn reset(&mut self, mut next: Segment<'_>) -> Result<()> {
        let newlines = self.newlines;
        *self = Self::build(newlines);
        next.reset()
    }

    fn eof(&self, next: SegmentRef<'_>) -> bool {
        self.unread().is_empty() && (self.finished || (next.eof() && self.carry.is_empty()))
    }

    /// Decoded bytes ready, plus what the undecoded tail will yield.
    fn read_pending(&self, next: SegmentRef<'_>) -> usize {
        self.unread().len() + self.carry.len() * 3 / 4 + next.read_pending()
    }

    fn write_pending(&self, next: SegmentRef<'_>) -> usize {
        self.pending.len() + self.outbox.len() + next.write_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::memory::MemoryIo;
    use crate::pipe::PipeIo;
    use proptest::prelude::*;

    fn encode(data: &[u8], filter: Base64Filter) -> Vec<u8> {
        let mut chain = Chain::new(filter);
        let sink = chain.link(MemoryIo::new());
        chain.write_all(data).unwrap();
        chain.flush().unwrap();
        chain.get_mut(sink).unwrap().take()
    }

    fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
        let mut chain = Chain::new(Base64Filter::new()).then(MemoryIo::copying(encoded));
        let mut out = Vec::new();
        chain.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_known_answer() {
        assert_eq!(encode(b"Hello, world!", Base64Filter::new()), b"SGVsbG8sIHdvcmxkIQ==");
        assert_eq!(decode(b"SGVsbG8sIHdvcmxkIQ==").unwrap(), b"Hello, world!");
    }

    #[test]
    fn test_description() {
        let chain = Chain::new(Base64Filter::new()).then(MemoryIo::new());
        assert_eq!(chain.to_string(), "base64 encoding<->(memory buffer)");
    }

    #[test]
    fn test_piecewise_writes() {
        let mut chain = Chain::new(Base64Filter::new());
        let sink = chain.link(MemoryIo::new());
        for byte in b"Hello, world!" {
            chain.write(std::slice::from_ref(byte)).unwrap();
        }
        chain.flush().unwrap();
        assert_eq!(chain.get(sink).unwrap().memory(), b"SGVsbG8sIHdvcmxkIQ==");
    }

    #[test]
    fn test_newlines_wrap_at_64() {
        let encoded = encode(&[0u8; 100], Base64Filter::with_newlines());
        let text = String::from_utf8(encoded).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 64);
        assert_eq!(lines[1].len(), 64);
        assert!(text.ends_with('\n'));
        assert_eq!(decode(text.as_bytes()).unwrap(), vec![0u8; 100]);
    }

    #[test]
    fn test_no_newlines_by_default() {
        let encoded = encode(&[1u8; 200], Base64Filter::new());
        assert!(!encoded.contains(&b'\n'));
    }

    #[test]
    fn test_unpadded_input_decodes() {
        assert_eq!(decode(b"SGk").unwrap(), b"Hi");
    }

    #[test]
    fn test_eof_loop_keeps_unpadded_tail() {
        let mut chain =
            Chain::new(Base64Filter::new()).then(MemoryIo::from("SGVsbG8sIHdvcmxkIQ"));
        let mut out = Vec::new();
        let mut buf = [0u8; 12];
        while !chain.eof() {
            let n = chain.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
            if n == 12 {
                // the last group is still undecoded
                assert!(!chain.eof());
                assert_eq!(chain.read_pending(), 1);
            }
        }
        assert_eq!(out, b"Hello, world!");
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(decode(b"!!!!"), Err(Error::Io(_))));
        assert!(matches!(decode(b"QUJDR"), Err(Error::Io(_))));
    }

    #[test]
    fn test_blocked_sink_reports_would_block() {
        let (a, b) = PipeIo::pair(4, 0);
        let mut chain = Chain::new(Base64Filter::new()).then(a);
        assert_eq!(chain.write(b"abcdef").unwrap(), 6);
        // four encoded bytes still queued here, four sitting in the pipe
        assert_eq!(chain.write_pending(), 8);
        assert!(matches!(chain.flush(), Err(Error::WouldBlock)));
        drop(b);
    }

    #[test]
    fn test_reset_discards_partial_group() {
        let mut chain = Chain::new(Base64Filter::new());
        let sink = chain.link(MemoryIo::new());
        chain.write(b"ab").unwrap();
        chain.reset().unwrap();
        chain.get_mut(sink).unwrap().clear();
        chain.write(b"Hi").unwrap();
        chain.flush().unwrap();
        assert_eq!(chain.get(sink).unwrap().memory(), b"SGk=");
    }

    proptest! {
        #[test]
        fn test_encode_then_decode(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode(&data, Base64Filter::new());
            prop_assert_eq!(decode(&encoded).unwrap(), data);
        }
    }
}

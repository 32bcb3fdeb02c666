//! Symmetric cipher filter.

use zeroize::Zeroizing;

use pipecrypt_common::{Error, Result};
use pipecrypt_crypto::{Cipher, CipherDescriptor, CipherEngine, Direction};

use crate::chain::{Segment, SegmentRef, Stage};

const READ_CHUNK: usize = 4096;

/// Encrypts or decrypts every byte passing through.
///
/// Written bytes are transformed and forwarded; [`Stage::flush`] emits the
/// final (padded) block. Read bytes are pulled from downstream and
/// transformed; the final block is produced when the source reports end of
/// data. A padding failure during that read-side finalization is recorded
/// rather than returned, and surfaces through
/// [`CipherFilter::ensure_decrypt_success`].
pub struct CipherFilter {
    descriptor: &'static CipherDescriptor,
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
    direction: Direction,
    engine: Box<dyn CipherEngine>,
    outbox: Vec<u8>,
    inbox: Vec<u8>,
    inbox_pos: usize,
    finalized: bool,
    failure: Option<Error>,
}

impl CipherFilter {
    /// # Errors
    /// - `AlgorithmNotFound` for an unknown custom cipher
    /// - `InvalidArgument` if the key or IV length does not match the cipher
    pub fn new(cipher: &Cipher, key: &[u8], iv: &[u8], direction: Direction) -> Result<Self> {
        let descriptor = cipher.require()?;
        let engine = descriptor.engine(key, iv, direction)?;
        Ok(Self {
            descriptor,
            key: Zeroizing::new(key.to_vec()),
            iv: Zeroizing::new(iv.to_vec()),
            direction,
            engine,
            outbox: Vec::new(),
            inbox: Vec::new(),
            inbox_pos: 0,
            finalized: false,
            failure: None,
        })
    }

    pub fn descriptor(&self) -> &'static CipherDescriptor {
        self.descriptor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Report whether finalization succeeded.
    ///
    /// # Errors
    /// - `CipherIntegrity` if the final block failed its padding check
    /// - `InvalidArgument` if the transform has not been finalized yet
    pub fn ensure_decrypt_success(&self) -> Result<()> {
        if !self.finalized {
            return Err(Error::InvalidArgument(format!(
                "{} transform has not been finalized",
                self.descriptor.name()
            )));
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn finish(&mut self, into_outbox: bool) -> Result<()> {
        self.finalized = true;
        let target = if into_outbox {
            &mut self.outbox
        } else {
            &mut self.inbox
        };
        if let Err(err) = self.engine.finalize(target) {
            self.failure = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn unread(&self) -> &[u8] {
        &self.inbox[self.inbox_pos..]
    }
}

impl Stage for CipherFilter {
    fn kind(&self) -> &'static str {
        "cipher"
    }

    fn write(&mut self, data: &[u8], mut next: Segment<'_>) -> Result<usize> {
        next.drain(&mut self.outbox)?;
        if !self.outbox.is_empty() {
            return Err(Error::WouldBlock);
        }
        if self.finalized {
            return Err(Error::InvalidArgument(
                "cipher already finalized; reset it first".to_string(),
            ));
        }
        self.engine.update(data, &mut self.outbox)?;
        next.drain(&mut self.outbox)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        while self.unread().is_empty() && !self.finalized {
            self.inbox.clear();
            self.inbox_pos = 0;
            let mut chunk = Zeroizing::new([0u8; READ_CHUNK]);
            match next.read(&mut chunk[..])? {
                // recorded for ensure_decrypt_success
                0 => {
                    let _ = self.finish(false);
                }
                n => self.engine.update(&chunk[..n], &mut self.inbox)?,
            }
        }
        let unread = self.unread();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.inbox_pos += n;
        Ok(n)
    }

    fn flush(&mut self, mut next: Segment<'_>) -> Result<()> {
        if !self.finalized {
            self.finish(true)?;
        }
        next.drain_all(&mut self.outbox)?;
        next.flush()
    }

    fn reset(&mut self, mut next: Segment<'_>) -> Result<()> {
        self.engine = self.descriptor.engine(&self.key, &self.iv, self.direction)?;
        self.outbox.clear();
        self.inbox.clear();
        self.inbox_pos = 0;
        self.finalized = false;
        self.failure = None;
        next.reset()
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.unread().is_empty() && self.finalized
    }

    fn read_pending(&self, next: SegmentRef<'_>) -> usize {
        self.unread().len() + next.read_pending()
    }

    fn write_pending(&self, next: SegmentRef<'_>) -> usize {
        self.outbox.len() + next.write_pending()
    }
}

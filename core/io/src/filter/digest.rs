//! Message digest filter.

use digest::DynDigest;

use pipecrypt_common::{Error, Result};
use pipecrypt_crypto::{Digest, DigestDescriptor};

use crate::chain::{Segment, Stage};

/// Passes bytes through unchanged while hashing everything that was written
/// or read through it.
///
/// The algorithm is resolved on first use, so an unknown custom name only
/// fails once bytes flow.
pub struct DigestFilter {
    digest: Digest,
    descriptor: Option<&'static DigestDescriptor>,
    hasher: Option<Box<dyn DynDigest + Send>>,
    finalized: bool,
}

impl DigestFilter {
    pub fn new(digest: Digest) -> Self {
        Self {
            digest,
            descriptor: None,
            hasher: None,
            finalized: false,
        }
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Size of the value [`DigestFilter::finalize`] returns.
    ///
    /// # Errors
    /// - `AlgorithmNotFound` for an unknown custom digest
    pub fn output_len(&mut self) -> Result<usize> {
        Ok(self.resolve()?.output_len())
    }

    fn resolve(&mut self) -> Result<&'static DigestDescriptor> {
        match self.descriptor {
            Some(descriptor) => Ok(descriptor),
            None => {
                let descriptor = self.digest.require()?;
                self.descriptor = Some(descriptor);
                Ok(descriptor)
            }
        }
    }

    fn hasher(&mut self) -> Result<&mut Box<dyn DynDigest + Send>> {
        if self.finalized {
            return Err(Error::InvalidArgument(format!(
                "{} digest already finalized; reset it first",
                self.digest
            )));
        }
        if self.hasher.is_none() {
            self.hasher = Some(self.resolve()?.hasher());
        }
        self.hasher
            .as_mut()
            .ok_or_else(|| Error::InvalidArgument("digest not started".to_string()))
    }

    /// Produce the digest of everything that passed through so far.
    ///
    /// This can be done once. Call [`Stage::reset`] on the chain to start a
    /// new digest.
    ///
    /// # Errors
    /// - `InvalidArgument` if the digest was already finalized
    /// - `AlgorithmNotFound` for an unknown custom digest
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        self.hasher()?;
        let hasher = self
            .hasher
            .take()
            .ok_or_else(|| Error::InvalidArgument("digest not started".to_string()))?;
        self.finalized = true;
        Ok(hasher.finalize().into_vec())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Start a fresh digest without touching the rest of the chain.
    pub fn restart(&mut self) {
        self.hasher = None;
        self.finalized = false;
    }
}

impl Stage for DigestFilter {
    fn kind(&self) -> &'static str {
        "message digest"
    }

    fn write(&mut self, data: &[u8], mut next: Segment<'_>) -> Result<usize> {
        self.hasher()?;
        let written = if next.is_empty() {
            data.len()
        } else {
            next.write(data)?
        };
        self.hasher()?.update(&data[..written]);
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        self.hasher()?;
        let n = next.read(buf)?;
        self.hasher()?.update(&buf[..n]);
        Ok(n)
    }

    fn reset(&mut self, mut next: Segment<'_>) -> Result<()> {
        self.restart();
        next.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::memory::MemoryIo;
    use crate::null::NullIo;

    const HELLO_SHA256: &str = "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3";

    #[test]
    fn test_digest_on_write() {
        let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Sha256));
        chain.link(NullIo::new());
        chain.puts("Hello, ").unwrap();
        chain.puts("world!").unwrap();
        let value = chain.get_mut(md).unwrap().finalize().unwrap();
        assert_eq!(hex::encode(value), HELLO_SHA256);
    }

    #[test]
    fn test_digest_on_read() {
        let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Sha256));
        chain.link(MemoryIo::from("Hello, world!"));
        let mut out = Vec::new();
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hello, world!");
        let value = chain.get_mut(md).unwrap().finalize().unwrap();
        assert_eq!(hex::encode(value), HELLO_SHA256);
    }

    #[test]
    fn test_passes_bytes_through() {
        let (mut chain, _) = Chain::with_head(DigestFilter::new(Digest::Md5));
        let sink = chain.link(MemoryIo::new());
        chain.puts("unchanged").unwrap();
        assert_eq!(chain.get(sink).unwrap().memory(), b"unchanged");
    }

    #[test]
    fn test_finalize_twice_fails() {
        let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Sha1));
        chain.link(NullIo::new());
        chain.puts("x").unwrap();
        let filter = chain.get_mut(md).unwrap();
        assert_eq!(filter.finalize().unwrap().len(), 20);
        assert!(matches!(filter.finalize(), Err(Error::InvalidArgument(_))));
        assert!(matches!(chain.puts("y"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_reset_starts_fresh() {
        let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Sha256));
        chain.link(NullIo::new());
        chain.puts("garbage").unwrap();
        chain.get_mut(md).unwrap().finalize().unwrap();

        chain.reset().unwrap();
        chain.puts("Hello, world!").unwrap();
        let value = chain.get_mut(md).unwrap().finalize().unwrap();
        assert_eq!(hex::encode(value), HELLO_SHA256);
    }

    #[test]
    fn test_empty_input() {
        let mut filter = DigestFilter::new(Digest::Md5);
        assert_eq!(
            hex::encode(filter.finalize().unwrap()),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_unknown_custom_fails_on_first_use() {
        let filter = DigestFilter::new(Digest::Custom("whirlpool".to_string()));
        let (mut chain, md) = Chain::with_head(filter);
        chain.link(NullIo::new());
        assert!(matches!(chain.puts("x"), Err(Error::AlgorithmNotFound(_))));
        assert!(matches!(
            chain.get_mut(md).unwrap().output_len(),
            Err(Error::AlgorithmNotFound(_))
        ));
    }

    #[test]
    fn test_custom_by_name() {
        let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Custom("SHA-256".into())));
        chain.link(NullIo::new());
        chain.puts("Hello, world!").unwrap();
        let value = chain.get_mut(md).unwrap().finalize().unwrap();
        assert_eq!(hex::encode(value), HELLO_SHA256);
    }
}

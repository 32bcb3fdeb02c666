//! Digests over buffers, readers and files.

use std::io::Read;
use std::path::Path;

use pipecrypt_common::Result;
use pipecrypt_crypto::Digest;
use pipecrypt_io::{Chain, DigestFilter, FileIo, IoConfig, NullIo};

/// Hash `data`. The result is as long as the digest's output length.
///
/// # Errors
/// - `AlgorithmNotFound` for an unknown custom digest
pub fn digest(data: &[u8], algorithm: &Digest) -> Result<Vec<u8>> {
    let (mut chain, md) = Chain::with_head(DigestFilter::new(algorithm.clone()));
    chain.link(NullIo::new());
    chain.write_all(data)?;
    chain.get_mut(md)?.finalize()
}

/// Hash everything `reader` yields, `chunk_size` bytes at a time.
///
/// A `chunk_size` of 0 selects the configured default.
pub fn digest_reader(
    mut reader: impl Read,
    algorithm: &Digest,
    chunk_size: usize,
) -> Result<Vec<u8>> {
    let (mut chain, md) = Chain::with_head(DigestFilter::new(algorithm.clone()));
    chain.link(NullIo::new());
    let mut chunk = vec![0u8; effective_chunk(chunk_size)];
    loop {
        match reader.read(&mut chunk)? {
            0 => break,
            n => chain.write_all(&chunk[..n])?,
        }
    }
    chain.get_mut(md)?.finalize()
}

/// Hash a file by reading it through a digest chain in `chunk_size` pieces.
///
/// A `chunk_size` of 0 selects the configured default (16 KiB).
///
/// # Errors
/// - `Io` if the file cannot be opened or read
/// - `AlgorithmNotFound` for an unknown custom digest
pub fn digest_file(
    path: impl AsRef<Path>,
    algorithm: &Digest,
    chunk_size: usize,
) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let (mut chain, md) = Chain::with_head(DigestFilter::new(algorithm.clone()));
    chain.link(FileIo::open(path, "rb")?);

    let mut chunk = vec![0u8; effective_chunk(chunk_size)];
    let mut total = 0usize;
    loop {
        match chain.read(&mut chunk)? {
            0 => break,
            n => total += n,
        }
    }
    tracing::debug!(path = %path.display(), digest = %algorithm, bytes = total, "file digested");
    chain.get_mut(md)?.finalize()
}

/// [`digest_file`] rendered as lowercase hex.
pub fn digest_file_hex(
    path: impl AsRef<Path>,
    algorithm: &Digest,
    chunk_size: usize,
) -> Result<String> {
    digest_file(path, algorithm, chunk_size).map(hex::encode)
}

fn effective_chunk(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        IoConfig::default().digest_chunk_size
    } else {
        chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecrypt_common::Error;

    const HELLO_SHA256: &str = "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3";

    #[test]
    fn test_sha256_known_answer() {
        let value = digest(b"Hello, world!", &Digest::Sha256).unwrap();
        assert_eq!(value.len(), 32);
        assert_eq!(hex::encode(value), HELLO_SHA256);
    }

    #[test]
    fn test_output_lengths() {
        let cases = [
            (Digest::Md4, 16),
            (Digest::Md5, 16),
            (Digest::Sha1, 20),
            (Digest::Sha224, 28),
            (Digest::Sha384, 48),
            (Digest::Sha512, 64),
            (Digest::Ripemd160, 20),
            (Digest::Custom("sha3-256".into()), 32),
        ];
        for (algorithm, len) in cases {
            assert_eq!(digest(b"abc", &algorithm).unwrap().len(), len, "{algorithm}");
        }
    }

    #[test]
    fn test_unknown_digest() {
        assert!(matches!(
            digest(b"abc", &Digest::Custom("sha0".into())),
            Err(Error::AlgorithmNotFound(_))
        ));
    }

    #[test]
    fn test_reader_matches_buffer() {
        let data = vec![0x5au8; 100_000];
        let streamed = digest_reader(data.as_slice(), &Digest::Sha1, 333).unwrap();
        assert_eq!(streamed, digest(&data, &Digest::Sha1).unwrap());
    }

    #[test]
    fn test_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"Hello, world!").unwrap();

        assert_eq!(digest_file_hex(&path, &Digest::Sha256, 0).unwrap(), HELLO_SHA256);
        assert_eq!(digest_file_hex(&path, &Digest::Sha256, 3).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            digest_file(dir.path().join("missing"), &Digest::Md5, 0),
            Err(Error::Io(_))
        ));
    }
}

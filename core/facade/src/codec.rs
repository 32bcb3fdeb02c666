//! Hex, base64 and base64url over byte buffers.

use bytes::Bytes;

use pipecrypt_common::{Error, Result};
use pipecrypt_crypto::Encoding;
use pipecrypt_io::{Base64Filter, Chain, MemoryIo};

/// Encode `data` as text bytes.
///
/// Hex output is lowercase. Base64 uses the standard alphabet with padding
/// and no line breaks; base64url swaps in `-` and `_` and drops the padding.
pub fn encode(data: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Hex => Ok(hex::encode(data).into_bytes()),
        Encoding::Base64 => base64_encode(data),
        Encoding::Base64Url => {
            let mut encoded = base64_encode(data)?;
            encoded.retain(|&c| c != b'=');
            for c in encoded.iter_mut() {
                match *c {
                    b'+' => *c = b'-',
                    b'/' => *c = b'_',
                    _ => {}
                }
            }
            Ok(encoded)
        }
    }
}

/// Decode text bytes produced by [`encode`].
///
/// # Errors
/// - `InvalidArgument` for hex input of odd length or with a non-hex
///   character
/// - `Io` for malformed base64 input
pub fn decode(data: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Hex => hex::decode(data)
            .map_err(|err| Error::InvalidArgument(format!("invalid hex input: {err}"))),
        Encoding::Base64 => base64_decode(Bytes::copy_from_slice(data)),
        Encoding::Base64Url => {
            let mut standard: Vec<u8> = data
                .iter()
                .map(|&c| match c {
                    b'-' => b'+',
                    b'_' => b'/',
                    other => other,
                })
                .collect();
            let padding = (4 - standard.len() % 4) % 4;
            standard.resize(standard.len() + padding, b'=');
            base64_decode(Bytes::from(standard))
        }
    }
}

fn base64_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut chain = Chain::new(Base64Filter::new());
    let sink = chain.link(MemoryIo::new());
    chain.write_all(data)?;
    chain.flush()?;

    let mut encoded = chain.segment(sink)?;
    let mut out = vec![0u8; encoded.read_pending()];
    let n = encoded.read(&mut out)?;
    out.truncate(n);
    Ok(out)
}

/// Decode through a read-only memory node that shares `data` without
/// copying it.
fn base64_decode(data: Bytes) -> Result<Vec<u8>> {
    let len = data.len();
    let mut chain = Chain::new(Base64Filter::new()).then(MemoryIo::wrap(data));

    // decoded output is never longer than its input
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < out.len() {
        match chain.read(&mut out[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    out.truncate(filled);
    Ok(out)
}

//! One-shot symmetric encryption over byte buffers.

use pipecrypt_common::Result;
use pipecrypt_crypto::{Cipher, Direction};

/// Encrypt `data` with `cipher`, applying PKCS#7 padding in block modes.
///
/// # Errors
/// - `AlgorithmNotFound` for an unknown custom cipher
/// - `InvalidArgument` if the key or IV length does not match the cipher
pub fn encrypt(data: &[u8], cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    transform(data, cipher, key, iv, Direction::Encrypt)
}

/// Decrypt `data` with `cipher`.
///
/// # Errors
/// - `CipherIntegrity` if the final block fails its padding check, which
///   usually means a wrong key or IV
/// - as for [`encrypt`]
pub fn decrypt(data: &[u8], cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    transform(data, cipher, key, iv, Direction::Decrypt)
}

fn transform(
    data: &[u8],
    cipher: &Cipher,
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> Result<Vec<u8>> {
    let descriptor = cipher.require()?;
    let mut engine = descriptor.engine(key, iv, direction)?;

    let block = descriptor.block_size();
    let capacity = match direction {
        Direction::Encrypt => data.len() + block,
        Direction::Decrypt if block == 1 => data.len() + block,
        Direction::Decrypt => data.len(),
    };
    let mut out = Vec::with_capacity(capacity);
    engine.update(data, &mut out)?;
    engine.finalize(&mut out)?;
    out.shrink_to_fit();
    Ok(out)
}

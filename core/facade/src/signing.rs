//! Signatures and MACs over byte buffers.

use pipecrypt_common::Result;
use pipecrypt_crypto::{Digest, Key};

/// Sign `data` with `key` over `algorithm`.
///
/// HMAC keys produce a MAC, RSA keys a PKCS#1 v1.5 signature and P-256
/// keys a DER-encoded ECDSA signature.
///
/// # Errors
/// - `Key` if `key` is a public key
/// - `AlgorithmNotFound` for an unknown custom digest
pub fn sign(data: &[u8], algorithm: &Digest, key: &Key) -> Result<Vec<u8>> {
    pipecrypt_crypto::sign(data, algorithm, key)
}

/// Check `signature` over `data`.
///
/// Every failure, including an unknown digest or an undecodable signature,
/// is reported as `false`.
pub fn verify(data: &[u8], algorithm: &Digest, signature: &[u8], key: &Key) -> bool {
    match pipecrypt_crypto::verify(data, algorithm, signature, key) {
        Ok(valid) => valid,
        Err(err) => {
            tracing::debug!(%err, digest = %algorithm, "verification failed");
            false
        }
    }
}

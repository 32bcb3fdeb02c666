//! Method-call sugar for byte-like values.

use pipecrypt_common::Result;
use pipecrypt_crypto::{Cipher, Digest, Encoding, Key};

use crate::{codec, hashing, signing, symmetric};

/// The facade functions as methods on anything that views as bytes.
///
/// ```
/// use pipecrypt::{CryptoExt, Digest, Encoding};
///
/// let hex = b"Hello, world!".encode(Encoding::Hex)?;
/// assert_eq!(hex, b"48656c6c6f2c20776f726c6421");
/// assert_eq!("abc".digest(&Digest::Sha1)?.len(), 20);
/// # Ok::<(), pipecrypt::Error>(())
/// ```
pub trait CryptoExt {
    fn encode(&self, encoding: Encoding) -> Result<Vec<u8>>;
    fn decode(&self, encoding: Encoding) -> Result<Vec<u8>>;
    fn digest(&self, algorithm: &Digest) -> Result<Vec<u8>>;
    /// Lowercase hex of [`CryptoExt::digest`].
    fn digest_hex(&self, algorithm: &Digest) -> Result<String>;
    fn sign(&self, algorithm: &Digest, key: &Key) -> Result<Vec<u8>>;
    fn verify(&self, algorithm: &Digest, signature: &[u8], key: &Key) -> bool;
    fn encrypt(&self, cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>>;
}

impl<T: AsRef<[u8]> + ?Sized> CryptoExt for T {
    fn encode(&self, encoding: Encoding) -> Result<Vec<u8>> {
        codec::encode(self.as_ref(), encoding)
    }

    fn decode(&self, encoding: Encoding) -> Result<Vec<u8>> {
        codec::decode(self.as_ref(), encoding)
    }

    fn digest(&self, algorithm: &Digest) -> Result<Vec<u8>> {
        hashing::digest(self.as_ref(), algorithm)
    }

    fn digest_hex(&self, algorithm: &Digest) -> Result<String> {
        hashing::digest(self.as_ref(), algorithm).map(hex::encode)
    }

    fn sign(&self, algorithm: &Digest, key: &Key) -> Result<Vec<u8>> {
        signing::sign(self.as_ref(), algorithm, key)
    }

    fn verify(&self, algorithm: &Digest, signature: &[u8], key: &Key) -> bool {
        signing::verify(self.as_ref(), algorithm, signature, key)
    }

    fn encrypt(&self, cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        symmetric::encrypt(self.as_ref(), cipher, key, iv)
    }

    fn decrypt(&self, cipher: &Cipher, key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        symmetric::decrypt(self.as_ref(), cipher, key, iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_and_vec_receivers() {
        let from_str = "Hello, world!".digest_hex(&Digest::Sha256).unwrap();
        let from_vec = b"Hello, world!".to_vec().digest_hex(&Digest::Sha256).unwrap();
        assert_eq!(from_str, from_vec);
        assert_eq!(
            from_str,
            "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
        );
    }

    #[test]
    fn test_chained_calls() {
        let encoded = "Hello, world!".encode(Encoding::Base64).unwrap();
        assert_eq!(encoded, b"SGVsbG8sIHdvcmxkIQ==");
        assert_eq!(encoded.decode(Encoding::Base64).unwrap(), b"Hello, world!");
    }

    #[test]
    fn test_encrypt_decrypt_methods() {
        let key = [4u8; 32];
        let iv = [5u8; 16];
        let ciphertext = "secret".encrypt(&Cipher::Aes256Cbc, &key, &iv).unwrap();
        assert_eq!(
            ciphertext.decrypt(&Cipher::Aes256Cbc, &key, &iv).unwrap(),
            b"secret"
        );
    }
}

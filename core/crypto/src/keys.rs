//! Key types consumed by signing and verification.
//!
//! A [`Key`] is either a raw HMAC secret or an asymmetric key parsed from PEM
//! text. Secret material is zeroized on drop and never shows up in `Debug`
//! output.

use std::fmt;
use std::path::Path;

use p256::ecdsa::{SigningKey, VerifyingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;
use zeroize::{Zeroize, ZeroizeOnDrop};

use pipecrypt_common::{Error, Result};

use crate::pem::normalize_pem;

/// Raw HMAC secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey {
    secret: Vec<u8>,
}

impl HmacKey {
    /// Get the secret bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey([REDACTED; {} bytes])", self.secret.len())
    }
}

/// An asymmetric key loaded from PEM.
#[derive(Clone)]
pub enum AsymmetricKey {
    RsaPrivate(RsaPrivateKey),
    RsaPublic(RsaPublicKey),
    EcPrivate(SigningKey),
    EcPublic(VerifyingKey),
}

impl AsymmetricKey {
    /// Short algorithm name: `"RSA"` or `"EC"`.
    pub fn algorithm(&self) -> &'static str {
        match self {
            AsymmetricKey::RsaPrivate(_) | AsymmetricKey::RsaPublic(_) => "RSA",
            AsymmetricKey::EcPrivate(_) | AsymmetricKey::EcPublic(_) => "EC",
        }
    }

    /// Whether this key holds private material and can sign.
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            AsymmetricKey::RsaPrivate(_) | AsymmetricKey::EcPrivate(_)
        )
    }
}

impl fmt::Debug for AsymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visibility = if self.is_private() { "private" } else { "public" };
        write!(f, "AsymmetricKey({} {}, [REDACTED])", self.algorithm(), visibility)
    }
}

/// Key handed to sign/verify.
#[derive(Clone, Debug)]
pub enum Key {
    Hmac(HmacKey),
    Asymmetric(AsymmetricKey),
}

impl Key {
    /// Wrap raw bytes as an HMAC secret.
    ///
    /// # Errors
    /// - `Key` if `secret` is empty
    pub fn hmac(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::Key("HMAC secret cannot be empty".to_string()));
        }
        Ok(Key::Hmac(HmacKey { secret }))
    }

    /// Parse an asymmetric key from PEM text.
    ///
    /// The text is normalized first (see [`normalize_pem`]), so keys pasted
    /// on a single line or with escaped newlines are accepted. Formats are
    /// tried in a fixed order and the first success wins:
    ///
    /// 1. PKCS#8 private key (RSA, then P-256; SEC1 `EC PRIVATE KEY` too)
    /// 2. SubjectPublicKeyInfo public key (RSA, then P-256)
    /// 3. X.509 certificate, taking its embedded public key
    /// 4. PKCS#1 `RSA PRIVATE KEY`
    ///
    /// # Errors
    /// - `Key` if none of the formats parse
    pub fn from_pem(source: &str) -> Result<Self> {
        let pem = normalize_pem(source);
        let key = private_key(&pem)
            .or_else(|| public_key(&pem))
            .or_else(|| certificate_key(&pem))
            .or_else(|| RsaPrivateKey::from_pkcs1_pem(&pem).ok().map(AsymmetricKey::RsaPrivate));

        match key {
            Some(key) => {
                tracing::debug!(
                    algorithm = key.algorithm(),
                    private = key.is_private(),
                    "loaded PEM key"
                );
                Ok(Key::Asymmetric(key))
            }
            None => Err(Error::Key("no public or private key could be read".to_string())),
        }
    }

    /// Read a PEM file and parse it with [`Key::from_pem`].
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `Key` if no key could be parsed
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_pem(&text)
    }

    /// Whether the key can produce signatures.
    pub fn can_sign(&self) -> bool {
        match self {
            Key::Hmac(_) => true,
            Key::Asymmetric(key) => key.is_private(),
        }
    }
}

fn private_key(pem: &str) -> Option<AsymmetricKey> {
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Some(AsymmetricKey::RsaPrivate(key));
    }
    if let Ok(key) = SigningKey::from_pkcs8_pem(pem) {
        return Some(AsymmetricKey::EcPrivate(key));
    }
    p256::SecretKey::from_sec1_pem(pem)
        .ok()
        .map(|secret| AsymmetricKey::EcPrivate(SigningKey::from(secret)))
}

fn public_key(pem: &str) -> Option<AsymmetricKey> {
    if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
        return Some(AsymmetricKey::RsaPublic(key));
    }
    VerifyingKey::from_public_key_pem(pem)
        .ok()
        .map(AsymmetricKey::EcPublic)
}

fn certificate_key(pem: &str) -> Option<AsymmetricKey> {
    let cert = Certificate::from_pem(pem.as_bytes()).ok()?;
    let spki = cert.tbs_certificate.subject_public_key_info.to_der().ok()?;
    if let Ok(key) = RsaPublicKey::from_public_key_der(&spki) {
        return Some(AsymmetricKey::RsaPublic(key));
    }
    VerifyingKey::from_public_key_der(&spki)
        .ok()
        .map(AsymmetricKey::EcPublic)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PKCS8: &str = include_str!("../testdata/rsa_pkcs8.pem");
    const RSA_PKCS1: &str = include_str!("../testdata/rsa_pkcs1.pem");
    const RSA_PUBLIC: &str = include_str!("../testdata/rsa_public.pem");
    const RSA_CERT: &str = include_str!("../testdata/rsa_cert.pem");
    const EC_PKCS8: &str = include_str!("../testdata/ec_pkcs8.pem");
    const EC_SEC1: &str = include_str!("../testdata/ec_sec1.pem");
    const EC_PUBLIC: &str = include_str!("../testdata/ec_public.pem");

    fn asymmetric(key: Key) -> AsymmetricKey {
        match key {
            Key::Asymmetric(key) => key,
            Key::Hmac(_) => panic!("expected an asymmetric key"),
        }
    }

    #[test]
    fn test_hmac_key() {
        let key = Key::hmac(b"secret".to_vec()).unwrap();
        assert!(key.can_sign());
        assert!(matches!(Key::hmac(Vec::new()), Err(Error::Key(_))));
    }

    #[test]
    fn test_hmac_debug_is_redacted() {
        let key = Key::hmac("hunter2").unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_rsa_pkcs8_private() {
        let key = asymmetric(Key::from_pem(RSA_PKCS8).unwrap());
        assert!(matches!(key, AsymmetricKey::RsaPrivate(_)));
    }

    #[test]
    fn test_rsa_pkcs1_private() {
        let key = asymmetric(Key::from_pem(RSA_PKCS1).unwrap());
        assert!(matches!(key, AsymmetricKey::RsaPrivate(_)));
    }

    #[test]
    fn test_rsa_public() {
        let key = asymmetric(Key::from_pem(RSA_PUBLIC).unwrap());
        assert!(matches!(key, AsymmetricKey::RsaPublic(_)));
        assert!(!key.is_private());
    }

    #[test]
    fn test_certificate_public_key() {
        let from_cert = asymmetric(Key::from_pem(RSA_CERT).unwrap());
        let from_spki = asymmetric(Key::from_pem(RSA_PUBLIC).unwrap());
        match (from_cert, from_spki) {
            (AsymmetricKey::RsaPublic(a), AsymmetricKey::RsaPublic(b)) => assert_eq!(a, b),
            other => panic!("unexpected keys: {other:?}"),
        }
    }

    #[test]
    fn test_ec_keys() {
        let key = asymmetric(Key::from_pem(EC_PKCS8).unwrap());
        assert!(matches!(key, AsymmetricKey::EcPrivate(_)));
        let key = asymmetric(Key::from_pem(EC_SEC1).unwrap());
        assert!(matches!(key, AsymmetricKey::EcPrivate(_)));
        let key = asymmetric(Key::from_pem(EC_PUBLIC).unwrap());
        assert_eq!(key.algorithm(), "EC");
        assert!(!key.is_private());
    }

    #[test]
    fn test_single_line_pem() {
        let flattened = RSA_PKCS8.replace('\n', "");
        let key = asymmetric(Key::from_pem(&flattened).unwrap());
        assert!(matches!(key, AsymmetricKey::RsaPrivate(_)));

        let escaped = EC_PUBLIC.replace('\n', "\\n");
        assert!(Key::from_pem(&escaped).is_ok());
    }

    #[test]
    fn test_garbage_fails() {
        match Key::from_pem("not a key") {
            Err(Error::Key(msg)) => assert_eq!(msg, "no public or private key could be read"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_from_pem_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, EC_PKCS8).unwrap();
        assert!(Key::from_pem_file(&path).unwrap().can_sign());
        assert!(Key::from_pem_file(dir.path().join("missing.pem")).is_err());
    }
}

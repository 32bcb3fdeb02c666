//! Signing and verification contexts.
//!
//! Both contexts follow the init, update, finalize shape: construct one for
//! a digest and a key, feed it any number of chunks, then finalize.
//!
//! HMAC keys are handled by recomputing the MAC. Verification compares the
//! result in constant time.

use digest::DynDigest;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::Signature;
use subtle::ConstantTimeEq;

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::hash::{Digest, DigestDescriptor, MacEngine};
use crate::keys::{AsymmetricKey, Key};

enum State {
    Mac(Box<dyn MacEngine>),
    Hash(Box<dyn DynDigest + Send>),
}

impl State {
    fn new(descriptor: &DigestDescriptor, key: &Key) -> Result<Self> {
        Ok(match key {
            Key::Hmac(secret) => State::Mac(descriptor.mac(secret.as_bytes())?),
            Key::Asymmetric(_) => State::Hash(descriptor.hasher()),
        })
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            State::Mac(mac) => mac.update(data),
            State::Hash(hasher) => hasher.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            State::Mac(mac) => mac.finalize(),
            State::Hash(hasher) => hasher.finalize().into_vec(),
        }
    }
}

/// Incremental signature computation.
pub struct SignContext<'k> {
    key: &'k Key,
    descriptor: &'static DigestDescriptor,
    state: State,
}

impl<'k> SignContext<'k> {
    /// Start a signature over `digest` with `key`.
    ///
    /// # Errors
    /// - `AlgorithmNotFound` for an unknown custom digest
    /// - `Key` if the key holds no private material
    pub fn new(digest: &Digest, key: &'k Key) -> Result<Self> {
        let descriptor = digest.require()?;
        if !key.can_sign() {
            return Err(Error::Key("a public key cannot sign".to_string()));
        }
        Ok(Self {
            key,
            descriptor,
            state: State::new(descriptor, key)?,
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Produce the signature (or MAC).
    ///
    /// RSA keys sign PKCS#1 v1.5 over the digest; P-256 keys produce a
    /// DER-encoded ECDSA signature.
    pub fn finalize(self) -> Result<Vec<u8>> {
        let hashed = self.state.finalize();
        match self.key {
            Key::Hmac(_) => Ok(hashed),
            Key::Asymmetric(AsymmetricKey::RsaPrivate(key)) => {
                let padding = self.descriptor.pkcs1_padding().ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "{} has no object identifier for RSA signatures",
                        self.descriptor.name()
                    ))
                })?;
                key.sign(padding, &hashed).map_err(|err| {
                    Error::Io(CryptoError::with_detail(Library::Rsa, Reason::BadSignature, err))
                })
            }
            Key::Asymmetric(AsymmetricKey::EcPrivate(key)) => {
                let signature: Signature = key.sign_prehash(&hashed).map_err(|err| {
                    Error::Io(CryptoError::with_detail(Library::Ec, Reason::BadSignature, err))
                })?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            Key::Asymmetric(_) => Err(Error::Key("a public key cannot sign".to_string())),
        }
    }
}

/// Incremental signature verification.
pub struct VerifyContext<'k> {
    key: &'k Key,
    descriptor: &'static DigestDescriptor,
    state: State,
}

impl<'k> VerifyContext<'k> {
    /// Start verifying a signature over `digest` with `key`.
    ///
    /// Private keys verify with their public half.
    pub fn new(digest: &Digest, key: &'k Key) -> Result<Self> {
        let descriptor = digest.require()?;
        Ok(Self {
            key,
            descriptor,
            state: State::new(descriptor, key)?,
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Check `signature` against everything fed so far.
    ///
    /// Returns `Ok(false)` for a well-formed but wrong signature, as well as
    /// for a signature that cannot be decoded.
    pub fn finalize(self, signature: &[u8]) -> Result<bool> {
        let VerifyContext {
            key,
            descriptor,
            state,
        } = self;
        let hashed = state.finalize();
        let valid = match key {
            Key::Hmac(_) => hashed.ct_eq(signature).into(),
            Key::Asymmetric(AsymmetricKey::RsaPrivate(key)) => {
                verify_rsa(descriptor, &key.to_public_key(), &hashed, signature)?
            }
            Key::Asymmetric(AsymmetricKey::RsaPublic(key)) => {
                verify_rsa(descriptor, key, &hashed, signature)?
            }
            Key::Asymmetric(AsymmetricKey::EcPrivate(key)) => {
                verify_ecdsa(key.verifying_key(), &hashed, signature)
            }
            Key::Asymmetric(AsymmetricKey::EcPublic(key)) => {
                verify_ecdsa(key, &hashed, signature)
            }
        };
        if !valid {
            tracing::debug!(digest = descriptor.name(), "signature did not verify");
        }
        Ok(valid)
    }
}

fn verify_rsa(
    descriptor: &DigestDescriptor,
    key: &rsa::RsaPublicKey,
    hashed: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let padding = descriptor.pkcs1_padding().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} has no object identifier for RSA signatures",
            descriptor.name()
        ))
    })?;
    Ok(key.verify(padding, hashed, signature).is_ok())
}

fn verify_ecdsa(key: &p256::ecdsa::VerifyingKey, hashed: &[u8], signature: &[u8]) -> bool {
    match Signature::from_der(signature) {
        Ok(signature) => key.verify_prehash(hashed, &signature).is_ok(),
        Err(_) => false,
    }
}

/// One-shot signature over `data`.
pub fn sign(data: &[u8], digest: &Digest, key: &Key) -> Result<Vec<u8>> {
    let mut ctx = SignContext::new(digest, key)?;
    ctx.update(data);
    ctx.finalize()
}

/// One-shot verification of `signature` over `data`.
pub fn verify(data: &[u8], digest: &Digest, signature: &[u8], key: &Key) -> Result<bool> {
    let mut ctx = VerifyContext::new(digest, key)?;
    ctx.update(data);
    ctx.finalize(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PKCS8: &str = include_str!("../testdata/rsa_pkcs8.pem");
    const RSA_PUBLIC: &str = include_str!("../testdata/rsa_public.pem");
    const RSA_CERT: &str = include_str!("../testdata/rsa_cert.pem");
    const RSA_SIGNATURE: &str = include_str!("../testdata/rsa_sha256_hello.hex");
    const EC_PKCS8: &str = include_str!("../testdata/ec_pkcs8.pem");
    const EC_PUBLIC: &str = include_str!("../testdata/ec_public.pem");
    const EC_SIGNATURE: &str = include_str!("../testdata/ec_sha256_hello.hex");

    const MESSAGE: &[u8] = b"Hello, world!";

    #[test]
    fn test_hmac_known_answer() {
        let key = Key::hmac("secret").unwrap();
        let mac = sign(MESSAGE, &Digest::Sha256, &key).unwrap();
        assert_eq!(
            hex::encode(&mac),
            "62419bf2fe15b171049ba48b1d5d90d7420421e88b8d6b2e54d8b7a4974d9447"
        );
        assert!(verify(MESSAGE, &Digest::Sha256, &mac, &key).unwrap());
    }

    #[test]
    fn test_hmac_rejects_tampering() {
        let key = Key::hmac("secret").unwrap();
        let mut mac = sign(MESSAGE, &Digest::Sha1, &key).unwrap();
        assert!(!verify(b"Hello, world?", &Digest::Sha1, &mac, &key).unwrap());
        mac[0] ^= 1;
        assert!(!verify(MESSAGE, &Digest::Sha1, &mac, &key).unwrap());
        assert!(!verify(MESSAGE, &Digest::Sha1, &mac[..4], &key).unwrap());
    }

    #[test]
    fn test_rsa_signature_is_deterministic() {
        let key = Key::from_pem(RSA_PKCS8).unwrap();
        let signature = sign(MESSAGE, &Digest::Sha256, &key).unwrap();
        assert_eq!(hex::encode(&signature), RSA_SIGNATURE.trim());
    }

    #[test]
    fn test_rsa_verify_with_public_and_certificate() {
        let signature = hex::decode(RSA_SIGNATURE.trim()).unwrap();
        for pem in [RSA_PUBLIC, RSA_CERT, RSA_PKCS8] {
            let key = Key::from_pem(pem).unwrap();
            assert!(verify(MESSAGE, &Digest::Sha256, &signature, &key).unwrap());
            assert!(!verify(b"tampered", &Digest::Sha256, &signature, &key).unwrap());
        }
    }

    #[test]
    fn test_ecdsa_roundtrip() {
        let private = Key::from_pem(EC_PKCS8).unwrap();
        let public = Key::from_pem(EC_PUBLIC).unwrap();
        let signature = sign(MESSAGE, &Digest::Sha256, &private).unwrap();
        assert!(verify(MESSAGE, &Digest::Sha256, &signature, &public).unwrap());
        assert!(!verify(b"tampered", &Digest::Sha256, &signature, &public).unwrap());
        assert!(!verify(MESSAGE, &Digest::Sha256, b"not der", &public).unwrap());
    }

    #[test]
    fn test_ecdsa_verifies_external_signature() {
        let public = Key::from_pem(EC_PUBLIC).unwrap();
        let signature = hex::decode(EC_SIGNATURE.trim()).unwrap();
        assert!(verify(MESSAGE, &Digest::Sha256, &signature, &public).unwrap());
    }

    #[test]
    fn test_public_key_cannot_sign() {
        let public = Key::from_pem(RSA_PUBLIC).unwrap();
        assert!(matches!(
            sign(MESSAGE, &Digest::Sha256, &public),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let key = Key::hmac("k").unwrap();
        let mut ctx = SignContext::new(&Digest::Sha512, &key).unwrap();
        ctx.update(b"Hello, ");
        ctx.update(b"world!");
        assert_eq!(
            ctx.finalize().unwrap(),
            sign(MESSAGE, &Digest::Sha512, &key).unwrap()
        );
    }

    #[test]
    fn test_unknown_digest() {
        let key = Key::hmac("k").unwrap();
        let digest = Digest::Custom("nope".to_string());
        assert!(matches!(
            sign(MESSAGE, &digest, &key),
            Err(Error::AlgorithmNotFound(_))
        ));
    }
}

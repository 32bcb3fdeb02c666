//! Cryptographic provider layer for pipecrypt.
//!
//! This crate provides:
//! - Digest and cipher enumerations resolved to provider descriptors
//! - Streaming cipher engines with PKCS#7 padding
//! - HMAC and asymmetric keys loaded from PEM
//! - Sign and verify contexts
//! - Secure random bytes
//!
//! # Security Guarantees
//! - HMAC secrets are zeroized on drop
//! - No plaintext or key material is ever logged
//! - MAC comparison is constant-time
//!
//! The primitives themselves come from the RustCrypto crates. This layer only
//! names them and wires them into streaming engines.

pub mod cipher;
pub mod encoding;
pub mod engine;
pub mod hash;
pub mod keys;
pub mod pem;
pub mod provider;
pub mod random;
pub mod sign;

pub use crate::cipher::{Cipher, CipherDescriptor, Direction, Mode};
pub use crate::encoding::Encoding;
pub use crate::engine::CipherEngine;
pub use crate::hash::{Digest, DigestDescriptor, MacEngine};
pub use crate::keys::{AsymmetricKey, HmacKey, Key};
pub use crate::pem::normalize_pem;
pub use crate::provider::{initialize, is_initialized, provider, Provider};
pub use crate::random::random_bytes;
pub use crate::sign::{sign, verify, SignContext, VerifyContext};

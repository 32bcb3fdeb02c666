//! Message digest algorithms and their descriptors.
//!
//! A [`Digest`] is a symbolic name. Resolving it through the provider yields a
//! [`DigestDescriptor`], which knows the output length and can build a fresh
//! hashing or HMAC engine on demand.

use std::fmt;

use digest::const_oid::AssociatedOid;
use digest::core_api::BlockSizeUser;
use digest::{DynDigest, InvalidLength, KeyInit, Mac};
use hmac::SimpleHmac;
use rsa::Pkcs1v15Sign;

use pipecrypt_common::{Error, Result};

use crate::provider::provider;

/// Supported digest algorithms.
///
/// `Custom` names are matched case-insensitively against the provider's
/// digest table, which also carries SHA-3 and BLAKE2 variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Digest {
    Md4,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Ripemd160,
    Custom(String),
}

impl Digest {
    /// Canonical provider name.
    pub fn name(&self) -> &str {
        match self {
            Digest::Md4 => "md4",
            Digest::Md5 => "md5",
            Digest::Sha1 => "sha1",
            Digest::Sha224 => "sha224",
            Digest::Sha256 => "sha256",
            Digest::Sha384 => "sha384",
            Digest::Sha512 => "sha512",
            Digest::Ripemd160 => "ripemd160",
            Digest::Custom(name) => name,
        }
    }

    /// Resolve to a provider descriptor.
    ///
    /// Returns `None` for a custom name the provider does not know. Callers
    /// surface that as [`Error::AlgorithmNotFound`] on first use.
    pub fn descriptor(&self) -> Option<&'static DigestDescriptor> {
        provider().digest(self.name())
    }

    /// Resolve to a provider descriptor, failing for unknown names.
    pub fn require(&self) -> Result<&'static DigestDescriptor> {
        self.descriptor()
            .ok_or_else(|| Error::AlgorithmNotFound(self.name().to_string()))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running HMAC state behind a trait object.
pub trait MacEngine: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

impl<M: Mac + Send> MacEngine for M {
    fn update(&mut self, data: &[u8]) {
        Mac::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        Mac::finalize(*self).into_bytes().to_vec()
    }
}

type DigestFactory = fn() -> Box<dyn DynDigest + Send>;
type MacFactory = fn(&[u8]) -> std::result::Result<Box<dyn MacEngine>, InvalidLength>;
type PaddingFactory = fn() -> Pkcs1v15Sign;

/// Immutable metadata and engine factories for one digest algorithm.
pub struct DigestDescriptor {
    name: &'static str,
    output_len: usize,
    block_len: usize,
    new: DigestFactory,
    hmac: MacFactory,
    pkcs1: Option<PaddingFactory>,
}

impl DigestDescriptor {
    pub(crate) fn of<D>(name: &'static str) -> Self
    where
        D: digest::Digest + DynDigest + BlockSizeUser + Default + Send + 'static,
    {
        Self {
            name,
            output_len: <D as digest::Digest>::output_size(),
            block_len: <D as BlockSizeUser>::block_size(),
            new: new_digest::<D>,
            hmac: new_hmac::<D>,
            pkcs1: None,
        }
    }

    /// Same as [`DigestDescriptor::of`] for digests that carry an ASN.1
    /// object identifier and can therefore drive RSA PKCS#1 v1.5 signatures.
    pub(crate) fn with_oid<D>(name: &'static str) -> Self
    where
        D: digest::Digest + DynDigest + BlockSizeUser + AssociatedOid + Default + Send + 'static,
    {
        Self {
            pkcs1: Some(pkcs1_padding::<D>),
            ..Self::of::<D>(name)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Digest output length in bytes.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Internal block length in bytes.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Create a fresh hashing engine.
    pub fn hasher(&self) -> Box<dyn DynDigest + Send> {
        (self.new)()
    }

    /// Create an HMAC engine keyed with `key`.
    ///
    /// # Errors
    /// - `InvalidArgument` if the key is rejected by the MAC
    pub fn mac(&self, key: &[u8]) -> Result<Box<dyn MacEngine>> {
        (self.hmac)(key).map_err(|_| {
            Error::InvalidArgument(format!("invalid HMAC key length for {}", self.name))
        })
    }

    /// PKCS#1 v1.5 signature padding for this digest, if it has an OID.
    pub fn pkcs1_padding(&self) -> Option<Pkcs1v15Sign> {
        self.pkcs1.map(|padding| padding())
    }

    /// One-shot digest of `data`.
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize().into_vec()
    }
}

impl fmt::Debug for DigestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestDescriptor")
            .field("name", &self.name)
            .field("output_len", &self.output_len)
            .field("block_len", &self.block_len)
            .finish()
    }
}

fn new_digest<D: DynDigest + Default + Send + 'static>() -> Box<dyn DynDigest + Send> {
    Box::new(D::default())
}

fn new_hmac<D>(key: &[u8]) -> std::result::Result<Box<dyn MacEngine>, InvalidLength>
where
    D: digest::Digest + BlockSizeUser + Send + 'static,
{
    let mac = <SimpleHmac<D> as KeyInit>::new_from_slice(key)?;
    Ok(Box::new(mac))
}

fn pkcs1_padding<D: digest::Digest + AssociatedOid>() -> Pkcs1v15Sign {
    Pkcs1v15Sign::new::<D>()
}

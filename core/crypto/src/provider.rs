//! Process-wide provider state.
//!
//! The algorithm tables are built exactly once, on first use, behind a
//! `OnceLock`. Concurrent first use from several threads blocks the losers
//! until the winner has finished; nobody ever observes a half-built table.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::cipher::{self, CipherDescriptor};
use crate::hash::DigestDescriptor;

static PROVIDER: OnceLock<Provider> = OnceLock::new();

/// Resolution tables for every digest and cipher the provider ships.
pub struct Provider {
    digests: HashMap<&'static str, DigestDescriptor>,
    ciphers: HashMap<&'static str, CipherDescriptor>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Provider {
    fn load() -> Self {
        let digests: HashMap<_, _> = digest_table()
            .into_iter()
            .map(|desc| (desc.name(), desc))
            .collect();
        let ciphers: HashMap<_, _> = cipher::load()
            .into_iter()
            .map(|desc| (desc.name(), desc))
            .collect();
        let aliases = DIGEST_ALIASES
            .iter()
            .chain(cipher::ALIASES)
            .copied()
            .collect();

        tracing::debug!(
            digests = digests.len(),
            ciphers = ciphers.len(),
            "crypto provider initialized"
        );
        Self {
            digests,
            ciphers,
            aliases,
        }
    }

    fn canonical<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        let lower = name.to_ascii_lowercase();
        match self.aliases.get(lower.as_str()) {
            Some(target) => std::borrow::Cow::Borrowed(*target),
            None => std::borrow::Cow::Owned(lower),
        }
    }

    /// Look up a digest by name or alias, ignoring case.
    pub fn digest(&self, name: &str) -> Option<&DigestDescriptor> {
        self.digests.get(self.canonical(name).as_ref())
    }

    /// Look up a cipher by name or alias, ignoring case.
    pub fn cipher(&self, name: &str) -> Option<&CipherDescriptor> {
        self.ciphers.get(self.canonical(name).as_ref())
    }

    /// Names of every digest, sorted.
    pub fn digest_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.digests.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Names of every cipher, sorted.
    pub fn cipher_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ciphers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Get the provider, initializing it on first use.
pub fn provider() -> &'static Provider {
    PROVIDER.get_or_init(Provider::load)
}

/// Force provider initialization. Calling this more than once is harmless.
pub fn initialize() {
    provider();
}

/// Whether the provider tables have been built.
pub fn is_initialized() -> bool {
    PROVIDER.get().is_some()
}

fn digest_table() -> Vec<DigestDescriptor> {
    vec![
        DigestDescriptor::with_oid::<md4::Md4>("md4"),
        DigestDescriptor::with_oid::<md5::Md5>("md5"),
        DigestDescriptor::with_oid::<sha1::Sha1>("sha1"),
        DigestDescriptor::with_oid::<sha2::Sha224>("sha224"),
        DigestDescriptor::with_oid::<sha2::Sha256>("sha256"),
        DigestDescriptor::with_oid::<sha2::Sha384>("sha384"),
        DigestDescriptor::with_oid::<sha2::Sha512>("sha512"),
        DigestDescriptor::with_oid::<sha2::Sha512_224>("sha512-224"),
        DigestDescriptor::with_oid::<sha2::Sha512_256>("sha512-256"),
        DigestDescriptor::with_oid::<ripemd::Ripemd160>("ripemd160"),
        DigestDescriptor::with_oid::<sha3::Sha3_224>("sha3-224"),
        DigestDescriptor::with_oid::<sha3::Sha3_256>("sha3-256"),
        DigestDescriptor::with_oid::<sha3::Sha3_384>("sha3-384"),
        DigestDescriptor::with_oid::<sha3::Sha3_512>("sha3-512"),
        DigestDescriptor::of::<blake2::Blake2b512>("blake2b512"),
        DigestDescriptor::of::<blake2::Blake2s256>("blake2s256"),
    ]
}

const DIGEST_ALIASES: &[(&str, &str)] = &[
    ("sha-1", "sha1"),
    ("sha-224", "sha224"),
    ("sha-256", "sha256"),
    ("sha-384", "sha384"),
    ("sha-512", "sha512"),
    ("sha512/224", "sha512-224"),
    ("sha512/256", "sha512-256"),
    ("rmd160", "ripemd160"),
    ("ripemd", "ripemd160"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        initialize();
        let first = provider() as *const Provider;
        initialize();
        assert!(is_initialized());
        assert_eq!(first, provider() as *const Provider);
    }

    #[test]
    fn test_concurrent_first_use_sees_one_provider() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| provider() as *const Provider as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_name_listing() {
        let names = provider().digest_names();
        assert!(names.contains(&"sha256"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(provider().cipher_names().contains(&"des-ede3-cbc"));
    }
}

//! Symmetric cipher names and descriptors.

use std::fmt;

use cipher::consts::U16;
use cipher::BlockSizeUser;

use pipecrypt_common::{Error, Result};

use crate::engine::{
    build_cbc, build_cfb, build_cfb8, build_ctr, build_ecb, build_ofb, BlockPrimitive,
    CipherEngine, EngineFactory,
};
use crate::provider::provider;

/// Whether a cipher transform encrypts or decrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Block chaining mode of a cipher descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Ecb,
    Cbc,
    Cfb,
    Cfb8,
    Ofb,
    Ctr,
}

macro_rules! ciphers {
    ($($variant:ident => $name:literal,)*) => {
        /// Supported symmetric ciphers.
        ///
        /// Names follow the usual `family-bits-mode` convention. `Custom`
        /// accepts any provider name or alias, case-insensitively.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Cipher {
            $($variant,)*
            Custom(String),
        }

        impl Cipher {
            /// Every named (non-custom) cipher.
            pub const NAMED: &'static [Cipher] = &[$(Cipher::$variant,)*];

            /// Canonical provider name.
            pub fn name(&self) -> &str {
                match self {
                    $(Cipher::$variant => $name,)*
                    Cipher::Custom(name) => name,
                }
            }
        }
    };
}

ciphers! {
    DesEcb => "des-ecb",
    DesCbc => "des-cbc",
    DesCfb => "des-cfb",
    DesCfb8 => "des-cfb8",
    DesOfb => "des-ofb",
    DesEdeEcb => "des-ede",
    DesEdeCbc => "des-ede-cbc",
    DesEdeCfb => "des-ede-cfb",
    DesEdeOfb => "des-ede-ofb",
    DesEde3Ecb => "des-ede3",
    DesEde3Cbc => "des-ede3-cbc",
    DesEde3Cfb => "des-ede3-cfb",
    DesEde3Cfb8 => "des-ede3-cfb8",
    DesEde3Ofb => "des-ede3-ofb",
    Rc2Ecb => "rc2-ecb",
    Rc2Cbc => "rc2-cbc",
    Rc2Cbc40 => "rc2-40-cbc",
    Rc2Cbc64 => "rc2-64-cbc",
    Rc2Cfb => "rc2-cfb",
    Rc2Ofb => "rc2-ofb",
    BlowfishEcb => "bf-ecb",
    BlowfishCbc => "bf-cbc",
    BlowfishCfb => "bf-cfb",
    BlowfishOfb => "bf-ofb",
    Cast5Ecb => "cast5-ecb",
    Cast5Cbc => "cast5-cbc",
    Cast5Cfb => "cast5-cfb",
    Cast5Ofb => "cast5-ofb",
    Aes128Ecb => "aes-128-ecb",
    Aes128Cbc => "aes-128-cbc",
    Aes128Cfb => "aes-128-cfb",
    Aes128Cfb8 => "aes-128-cfb8",
    Aes128Ofb => "aes-128-ofb",
    Aes128Ctr => "aes-128-ctr",
    Aes192Ecb => "aes-192-ecb",
    Aes192Cbc => "aes-192-cbc",
    Aes192Cfb => "aes-192-cfb",
    Aes192Cfb8 => "aes-192-cfb8",
    Aes192Ofb => "aes-192-ofb",
    Aes192Ctr => "aes-192-ctr",
    Aes256Ecb => "aes-256-ecb",
    Aes256Cbc => "aes-256-cbc",
    Aes256Cfb => "aes-256-cfb",
    Aes256Cfb8 => "aes-256-cfb8",
    Aes256Ofb => "aes-256-ofb",
    Aes256Ctr => "aes-256-ctr",
    Camellia128Ecb => "camellia-128-ecb",
    Camellia128Cbc => "camellia-128-cbc",
    Camellia128Cfb => "camellia-128-cfb",
    Camellia128Cfb8 => "camellia-128-cfb8",
    Camellia128Ofb => "camellia-128-ofb",
    Camellia192Ecb => "camellia-192-ecb",
    Camellia192Cbc => "camellia-192-cbc",
    Camellia192Cfb => "camellia-192-cfb",
    Camellia192Cfb8 => "camellia-192-cfb8",
    Camellia192Ofb => "camellia-192-ofb",
    Camellia256Ecb => "camellia-256-ecb",
    Camellia256Cbc => "camellia-256-cbc",
    Camellia256Cfb => "camellia-256-cfb",
    Camellia256Cfb8 => "camellia-256-cfb8",
    Camellia256Ofb => "camellia-256-ofb",
}

impl Cipher {
    /// Resolve to a provider descriptor.
    ///
    /// Returns `None` for a custom name the provider does not know.
    pub fn descriptor(&self) -> Option<&'static CipherDescriptor> {
        provider().cipher(self.name())
    }

    /// Resolve to a provider descriptor, failing for unknown names.
    pub fn require(&self) -> Result<&'static CipherDescriptor> {
        self.descriptor()
            .ok_or_else(|| Error::AlgorithmNotFound(self.name().to_string()))
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable metadata and engine factory for one cipher.
pub struct CipherDescriptor {
    name: &'static str,
    mode: Mode,
    block_size: usize,
    key_len: usize,
    iv_len: usize,
    build: EngineFactory,
}

/// Modes available to every block primitive regardless of block size.
#[derive(Clone, Copy)]
enum Chaining {
    Ecb,
    Cbc,
    Cfb,
    Cfb8,
    Ofb,
}

impl CipherDescriptor {
    fn of<C: BlockPrimitive>(name: &'static str, chaining: Chaining, key_len: usize) -> Self {
        let block = C::block_size();
        let (mode, block_size, iv_len, build): (Mode, usize, usize, EngineFactory) =
            match chaining {
                Chaining::Ecb => (Mode::Ecb, block, 0, build_ecb::<C> as EngineFactory),
                Chaining::Cbc => (Mode::Cbc, block, block, build_cbc::<C> as EngineFactory),
                Chaining::Cfb => (Mode::Cfb, 1, block, build_cfb::<C> as EngineFactory),
                Chaining::Cfb8 => (Mode::Cfb8, 1, block, build_cfb8::<C> as EngineFactory),
                Chaining::Ofb => (Mode::Ofb, 1, block, build_ofb::<C> as EngineFactory),
            };
        Self {
            name,
            mode,
            block_size,
            key_len,
            iv_len,
            build,
        }
    }

    fn counter<C>(name: &'static str, key_len: usize) -> Self
    where
        C: BlockPrimitive + BlockSizeUser<BlockSize = U16>,
    {
        Self {
            name,
            mode: Mode::Ctr,
            block_size: 1,
            key_len,
            iv_len: C::block_size(),
            build: build_ctr::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Block size in bytes. Stream-like modes (CFB, OFB, CTR) report 1.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// IV length in bytes (0 for ECB).
    pub fn iv_len(&self) -> usize {
        self.iv_len
    }

    /// Build a fresh engine.
    ///
    /// # Preconditions
    /// - `key.len() == self.key_len()`
    /// - `iv.len() == self.iv_len()`
    ///
    /// # Errors
    /// - `InvalidArgument` if key or IV length is wrong
    pub fn engine(
        &self,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
    ) -> Result<Box<dyn CipherEngine>> {
        if key.len() != self.key_len {
            return Err(Error::InvalidArgument(format!(
                "{} expects a {}-byte key, got {}",
                self.name,
                self.key_len,
                key.len()
            )));
        }
        if iv.len() != self.iv_len {
            return Err(Error::InvalidArgument(format!(
                "{} expects a {}-byte IV, got {}",
                self.name,
                self.iv_len,
                iv.len()
            )));
        }
        (self.build)(key, iv, direction)
            .map_err(|_| Error::InvalidArgument(format!("{} rejected the key", self.name)))
    }
}

impl fmt::Debug for CipherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherDescriptor")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("block_size", &self.block_size)
            .field("key_len", &self.key_len)
            .field("iv_len", &self.iv_len)
            .finish()
    }
}

fn family<C: BlockPrimitive>(
    table: &mut Vec<CipherDescriptor>,
    names: &[(&'static str, Chaining)],
    key_len: usize,
) {
    table.extend(
        names
            .iter()
            .map(|&(name, chaining)| CipherDescriptor::of::<C>(name, chaining, key_len)),
    );
}

/// Build the full cipher table.
pub(crate) fn load() -> Vec<CipherDescriptor> {
    use Chaining::*;

    let mut table = Vec::new();
    family::<des::Des>(
        &mut table,
        &[
            ("des-ecb", Ecb),
            ("des-cbc", Cbc),
            ("des-cfb", Cfb),
            ("des-cfb8", Cfb8),
            ("des-ofb", Ofb),
        ],
        8,
    );
    family::<des::TdesEde2>(
        &mut table,
        &[
            ("des-ede", Ecb),
            ("des-ede-cbc", Cbc),
            ("des-ede-cfb", Cfb),
            ("des-ede-ofb", Ofb),
        ],
        16,
    );
    family::<des::TdesEde3>(
        &mut table,
        &[
            ("des-ede3", Ecb),
            ("des-ede3-cbc", Cbc),
            ("des-ede3-cfb", Cfb),
            ("des-ede3-cfb8", Cfb8),
            ("des-ede3-ofb", Ofb),
        ],
        24,
    );
    family::<rc2::Rc2>(
        &mut table,
        &[
            ("rc2-ecb", Ecb),
            ("rc2-cbc", Cbc),
            ("rc2-cfb", Cfb),
            ("rc2-ofb", Ofb),
        ],
        16,
    );
    family::<rc2::Rc2>(&mut table, &[("rc2-40-cbc", Cbc)], 5);
    family::<rc2::Rc2>(&mut table, &[("rc2-64-cbc", Cbc)], 8);
    family::<blowfish::Blowfish>(
        &mut table,
        &[
            ("bf-ecb", Ecb),
            ("bf-cbc", Cbc),
            ("bf-cfb", Cfb),
            ("bf-ofb", Ofb),
        ],
        16,
    );
    family::<cast5::Cast5>(
        &mut table,
        &[
            ("cast5-ecb", Ecb),
            ("cast5-cbc", Cbc),
            ("cast5-cfb", Cfb),
            ("cast5-ofb", Ofb),
        ],
        16,
    );

    family::<aes::Aes128>(
        &mut table,
        &[
            ("aes-128-ecb", Ecb),
            ("aes-128-cbc", Cbc),
            ("aes-128-cfb", Cfb),
            ("aes-128-cfb8", Cfb8),
            ("aes-128-ofb", Ofb),
        ],
        16,
    );
    family::<aes::Aes192>(
        &mut table,
        &[
            ("aes-192-ecb", Ecb),
            ("aes-192-cbc", Cbc),
            ("aes-192-cfb", Cfb),
            ("aes-192-cfb8", Cfb8),
            ("aes-192-ofb", Ofb),
        ],
        24,
    );
    family::<aes::Aes256>(
        &mut table,
        &[
            ("aes-256-ecb", Ecb),
            ("aes-256-cbc", Cbc),
            ("aes-256-cfb", Cfb),
            ("aes-256-cfb8", Cfb8),
            ("aes-256-ofb", Ofb),
        ],
        32,
    );
    table.push(CipherDescriptor::counter::<aes::Aes128>("aes-128-ctr", 16));
    table.push(CipherDescriptor::counter::<aes::Aes192>("aes-192-ctr", 24));
    table.push(CipherDescriptor::counter::<aes::Aes256>("aes-256-ctr", 32));

    family::<camellia::Camellia128>(
        &mut table,
        &[
            ("camellia-128-ecb", Ecb),
            ("camellia-128-cbc", Cbc),
            ("camellia-128-cfb", Cfb),
            ("camellia-128-cfb8", Cfb8),
            ("camellia-128-ofb", Ofb),
        ],
        16,
    );
    family::<camellia::Camellia192>(
        &mut table,
        &[
            ("camellia-192-ecb", Ecb),
            ("camellia-192-cbc", Cbc),
            ("camellia-192-cfb", Cfb),
            ("camellia-192-cfb8", Cfb8),
            ("camellia-192-ofb", Ofb),
        ],
        24,
    );
    family::<camellia::Camellia256>(
        &mut table,
        &[
            ("camellia-256-ecb", Ecb),
            ("camellia-256-cbc", Cbc),
            ("camellia-256-cfb", Cfb),
            ("camellia-256-cfb8", Cfb8),
            ("camellia-256-ofb", Ofb),
        ],
        32,
    );
    table
}

/// Short names accepted for `Cipher::Custom`.
pub(crate) const ALIASES: &[(&str, &str)] = &[
    ("des", "des-cbc"),
    ("des-ede-ecb", "des-ede"),
    ("des-ede3-ecb", "des-ede3"),
    ("des3", "des-ede3-cbc"),
    ("rc2", "rc2-cbc"),
    ("rc2-128", "rc2-cbc"),
    ("rc2-40", "rc2-40-cbc"),
    ("rc2-64", "rc2-64-cbc"),
    ("bf", "bf-cbc"),
    ("blowfish", "bf-cbc"),
    ("cast", "cast5-cbc"),
    ("cast-cbc", "cast5-cbc"),
    ("aes128", "aes-128-cbc"),
    ("aes192", "aes-192-cbc"),
    ("aes256", "aes-256-cbc"),
    ("camellia128", "camellia-128-cbc"),
    ("camellia192", "camellia-192-cbc"),
    ("camellia256", "camellia-256-cbc"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_des_ede3_cbc_metadata() {
        let desc = Cipher::DesEde3Cbc.descriptor().unwrap();
        assert_eq!(desc.block_size(), 8);
        assert_eq!(desc.key_len(), 24);
        assert_eq!(desc.iv_len(), 8);
        assert_eq!(desc.mode(), Mode::Cbc);
    }

    #[test]
    fn test_every_named_cipher_resolves() {
        for cipher in Cipher::NAMED {
            let desc = cipher.require().unwrap();
            assert_eq!(desc.name(), cipher.name());
        }
    }

    #[test]
    fn test_stream_modes_report_block_size_one() {
        for cipher in [Cipher::Aes256Ctr, Cipher::Aes128Cfb, Cipher::BlowfishOfb] {
            assert_eq!(cipher.require().unwrap().block_size(), 1);
        }
        assert_eq!(Cipher::Aes128Ecb.require().unwrap().iv_len(), 0);
        assert_eq!(Cipher::Rc2Cbc40.require().unwrap().key_len(), 5);
    }

    #[test]
    fn test_alias_lookup() {
        let desc = Cipher::Custom("AES256".to_string()).require().unwrap();
        assert_eq!(desc.name(), "aes-256-cbc");
        let desc = Cipher::Custom("des3".to_string()).require().unwrap();
        assert_eq!(desc.name(), "des-ede3-cbc");
    }

    #[test]
    fn test_unknown_cipher_fails_at_use() {
        let cipher = Cipher::Custom("rc4".to_string());
        assert!(cipher.descriptor().is_none());
        assert!(matches!(cipher.require(), Err(Error::AlgorithmNotFound(_))));
    }

    #[test]
    fn test_engine_checks_lengths() {
        let desc = Cipher::Aes128Cbc.require().unwrap();
        let err = desc
            .engine(&[0u8; 16], &[0u8; 8], Direction::Encrypt)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(desc.engine(&[0u8; 16], &[0u8; 16], Direction::Encrypt).is_ok());
    }
}

//! pipecrypt: composable crypto I/O chains and buffer-level helpers.
//!
//! The chain core lives in [`pipecrypt_io`]; algorithms, keys and signing
//! contexts live in [`pipecrypt_crypto`]. This crate re-exports both and
//! adds one-shot functions over byte buffers:
//!
//! ```
//! use pipecrypt::{digest, encode, Digest, Encoding};
//!
//! let sum = digest(b"Hello, world!", &Digest::Sha256)?;
//! assert_eq!(encode(&sum, Encoding::Hex)?.len(), 64);
//! # Ok::<(), pipecrypt::Error>(())
//! ```

pub mod codec;
pub mod ext;
pub mod hashing;
pub mod signing;
pub mod symmetric;

pub use codec::{decode, encode};
pub use ext::CryptoExt;
pub use hashing::{digest, digest_file, digest_file_hex, digest_reader};
pub use signing::{sign, verify};
pub use symmetric::{decrypt, encrypt};

pub use pipecrypt_common::{clear_errors, last_error, take_last_error, CryptoError, Error, Result};
pub use pipecrypt_crypto::{
    initialize, is_initialized, normalize_pem, random_bytes, AsymmetricKey, Cipher, Digest,
    Direction, Encoding, HmacKey, Key, Mode, SignContext, VerifyContext,
};
pub use pipecrypt_io::{
    AcceptIo, Base64Filter, BufferFilter, Chain, CipherFilter, CloseFlag, ConnectIo,
    DigestFilter, FileIo, Handle, IoConfig, MemoryIo, NodeId, NullIo, PipeIo, SocketIo, Stage,
    StdStream,
};

/// Install a `tracing` subscriber that honours `RUST_LOG`, defaulting to
/// `info`. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

//! Common error types for pipecrypt.

use std::fmt;
use thiserror::Error;

/// Top-level error type for pipecrypt operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A stream stage or provider call failed.
    #[error("I/O error: {0}")]
    Io(CryptoError),

    /// A non-blocking node could not make progress. Retry later.
    #[error("Operation would block")]
    WouldBlock,

    /// A custom digest or cipher name is unknown to the provider.
    #[error("Algorithm not found: {0}")]
    AlgorithmNotFound(String),

    /// No key could be constructed or the key cannot perform the operation.
    #[error("Key error: {0}")]
    Key(String),

    /// Decrypt finalization failed (bad padding or wrong key).
    #[error("Cipher integrity check failed: {0}")]
    CipherIntegrity(CryptoError),

    /// Invalid input provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A node handle was used against a chain that does not own it.
    #[error("Chain error: {0}")]
    Chain(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build an `Io` error from a library/reason pair, recording it in the
    /// thread's error channel.
    pub fn io(library: Library, reason: Reason) -> Self {
        Error::Io(CryptoError::new(library, reason))
    }

    /// Returns true if the caller should retry the same call later.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock => Error::WouldBlock,
            _ => Error::Io(CryptoError::from_io(&err)),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Library component a failure originated in.
///
/// The numeric values are packed into the top byte of [`CryptoError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    Sys,
    Rsa,
    Evp,
    Pem,
    X509,
    Asn1,
    Crypto,
    Ec,
    Bio,
    Rand,
}

impl Library {
    pub fn code(self) -> u32 {
        match self {
            Library::Sys => 2,
            Library::Rsa => 4,
            Library::Evp => 6,
            Library::Pem => 9,
            Library::X509 => 11,
            Library::Asn1 => 13,
            Library::Crypto => 15,
            Library::Ec => 16,
            Library::Bio => 32,
            Library::Rand => 36,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Library::Sys => "system library",
            Library::Rsa => "rsa routines",
            Library::Evp => "digital envelope routines",
            Library::Pem => "PEM routines",
            Library::X509 => "x509 certificate routines",
            Library::Asn1 => "asn1 encoding routines",
            Library::Crypto => "common libcrypto routines",
            Library::Ec => "elliptic curve routines",
            Library::Bio => "BIO routines",
            Library::Rand => "random number generator",
        }
    }
}

/// Reason a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Operating system error number.
    Os(i32),
    WriteToReadOnly,
    UnsupportedMethod,
    BrokenPipe,
    BufferFull,
    Uninitialized,
    BadDecrypt,
    WrongFinalBlockLength,
    InvalidKeyLength,
    InvalidIvLength,
    NoStartLine,
    BadSignature,
    DecodeError,
    UnsupportedAlgorithm,
}

impl Reason {
    pub fn code(self) -> u32 {
        match self {
            Reason::Os(errno) => errno.unsigned_abs() & 0x00ff_ffff,
            Reason::WriteToReadOnly => 126,
            Reason::UnsupportedMethod => 121,
            Reason::BrokenPipe => 124,
            Reason::BufferFull => 125,
            Reason::Uninitialized => 120,
            Reason::BadDecrypt => 100,
            Reason::WrongFinalBlockLength => 109,
            Reason::InvalidKeyLength => 130,
            Reason::InvalidIvLength => 194,
            Reason::NoStartLine => 108,
            Reason::BadSignature => 104,
            Reason::DecodeError => 102,
            Reason::UnsupportedAlgorithm => 199,
        }
    }

    pub fn description(self) -> String {
        match self {
            Reason::Os(errno) => std::io::Error::from_raw_os_error(errno).to_string(),
            Reason::WriteToReadOnly => "write to read only BIO".to_string(),
            Reason::UnsupportedMethod => "unsupported method".to_string(),
            Reason::BrokenPipe => "broken pipe".to_string(),
            Reason::BufferFull => "buffer full".to_string(),
            Reason::Uninitialized => "uninitialized".to_string(),
            Reason::BadDecrypt => "bad decrypt".to_string(),
            Reason::WrongFinalBlockLength => "wrong final block length".to_string(),
            Reason::InvalidKeyLength => "invalid key length".to_string(),
            Reason::InvalidIvLength => "invalid iv length".to_string(),
            Reason::NoStartLine => "no start line".to_string(),
            Reason::BadSignature => "bad signature".to_string(),
            Reason::DecodeError => "decode error".to_string(),
            Reason::UnsupportedAlgorithm => "unsupported algorithm".to_string(),
        }
    }
}

/// A provider failure captured at the moment it happened.
///
/// The message is formatted once, during construction, and a copy is pushed
/// to the calling thread's error channel. Later provider calls can never
/// overwrite what an existing `CryptoError` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoError {
    code: u32,
    message: String,
}

impl CryptoError {
    /// Create and record a new provider error.
    pub fn new(library: Library, reason: Reason) -> Self {
        let message = format!("{}:{}", library.name(), reason.description());
        Self::record(library, reason, message)
    }

    /// Create and record a provider error with extra context.
    pub fn with_detail(library: Library, reason: Reason, detail: impl fmt::Display) -> Self {
        let message = format!("{}:{}:{}", library.name(), reason.description(), detail);
        Self::record(library, reason, message)
    }

    /// Capture an operating system failure.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::new(Library::Sys, Reason::Os(errno)),
            None => Self::record(
                Library::Sys,
                Reason::Os(0),
                format!("{}:{}", Library::Sys.name(), err),
            ),
        }
    }

    fn record(library: Library, reason: Reason, message: String) -> Self {
        let err = Self {
            code: (library.code() << 24) | reason.code(),
            message,
        };
        crate::channel::push(err.clone());
        err
    }

    /// Packed numeric code: library in the top byte, reason below.
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn library_code(&self) -> u32 {
        self.code >> 24
    }

    pub fn reason_code(&self) -> u32 {
        self.code & 0x00ff_ffff
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error:{:08X}:{}", self.code, self.message)
    }
}

impl std::error::Error for CryptoError {}

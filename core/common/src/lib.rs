//! Common types shared across the pipecrypt crates.
//!
//! This crate provides the error taxonomy used by every layer and the
//! thread-local error channel that records provider failures at the moment
//! they happen.

pub mod channel;
pub mod error;

pub use channel::{clear_errors, last_error, take_last_error};
pub use error::{CryptoError, Error, Library, Reason, Result};

//! Filter stages: transform bytes on their way to or from the next stage.

pub mod base64;
pub mod buffer;
pub mod cipher;
pub mod digest;

pub use self::base64::Base64Filter;
pub use self::buffer::BufferFilter;
pub use self::cipher::CipherFilter;
pub use self::digest::DigestFilter;

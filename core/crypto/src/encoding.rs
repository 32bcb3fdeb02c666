//! Text encodings offered by the facade.

use std::fmt;

/// Binary-to-text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Lowercase hexadecimal, two characters per byte.
    Hex,
    /// RFC 4648 standard alphabet with `=` padding, no line breaks.
    Base64,
    /// RFC 4648 URL-safe alphabet, unpadded.
    Base64Url,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
            Encoding::Base64Url => "base64url",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

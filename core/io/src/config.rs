//! Tunables for chain nodes.

use serde::{Deserialize, Serialize};

use pipecrypt_common::{Error, Result};

/// Sizes and defaults used by nodes that take a `with_config` constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Write buffer size of each pipe end.
    pub pipe_capacity: usize,
    /// Size of a buffering filter.
    pub buffer_size: usize,
    /// Chunk size for streaming a file through a digest.
    pub digest_chunk_size: usize,
    /// Whether base64 output is broken into 64-character lines.
    pub base64_newlines: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            pipe_capacity: crate::pipe::DEFAULT_PIPE_CAPACITY,
            buffer_size: crate::filter::buffer::DEFAULT_BUFFER_SIZE,
            digest_chunk_size: 16 * 1024,
            base64_newlines: false,
        }
    }
}

impl IoConfig {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IoConfig::default();
        assert_eq!(config.pipe_capacity, 17 * 1024);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.digest_chunk_size, 16 * 1024);
        assert!(!config.base64_newlines);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = IoConfig {
            pipe_capacity: 64,
            base64_newlines: true,
            ..IoConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(IoConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json() {
        let config = IoConfig::from_json(r#"{"buffer_size": 8192}"#).unwrap();
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.pipe_capacity, 17 * 1024);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            IoConfig::from_json("not json"),
            Err(Error::Serialization(_))
        ));
    }
}

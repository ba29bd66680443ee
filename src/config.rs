//! Wire configuration
//!
//! Everything a framing endpoint needs to know about the network it is
//! on. Loaded from JSON:
//!
//! ```json
//! { "magic": "fabfb5da", "protocol_version": 1, "max_payload_size": 33554432 }
//! ```

use crate::error::{Result, WireError};
use crate::network::message::DEFAULT_MAGIC;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Protocol version advertised in `version` payloads
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload a stream endpoint will buffer (32 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Network and framing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Start string of every frame on this network
    #[serde(with = "magic_hex")]
    pub magic: [u8; 4],
    pub protocol_version: u32,
    /// Frames announcing more payload than this are rejected unread
    pub max_payload_size: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            magic: DEFAULT_MAGIC,
            protocol_version: PROTOCOL_VERSION,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl WireConfig {
    /// Load a configuration file; missing fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let config: WireConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WireError::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded wire config from {}", path.display());
        Ok(config)
    }

    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }
}

/// Parse a network magic written as 8 hex digits
pub fn parse_magic(s: &str) -> Result<[u8; 4]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| WireError::Config(format!("magic {:?}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| WireError::Config(format!("magic {:?} must be 4 bytes", s)))
}

mod magic_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(magic: &[u8; 4], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(magic))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 4], D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_magic(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WireConfig::default();
        assert_eq!(config.magic, [0xFA, 0xBF, 0xB5, 0xDA]);
        assert_eq!(config.protocol_version, 1);
        assert_eq!(config.max_payload_size, 32 * 1024 * 1024);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wire.json");
        let mut file = File::create(&path).unwrap();
        write!(file, r#"{{ "magic": "0b110907", "max_payload_size": 1024 }}"#).unwrap();

        let config = WireConfig::load(&path).unwrap();
        assert_eq!(config.magic, [0x0B, 0x11, 0x09, 0x07]);
        assert_eq!(config.max_payload_size, 1024);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            WireConfig::load(temp_dir.path().join("missing.json")),
            Err(WireError::Io(_))
        ));

        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "magic": "abc" }"#).unwrap();
        assert!(matches!(WireConfig::load(&path), Err(WireError::Config(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = WireConfig::default().with_magic([1, 2, 3, 4]);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"01020304\""));
        let back: WireConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_parse_magic() {
        assert_eq!(parse_magic("0xfabfb5da").unwrap(), DEFAULT_MAGIC);
        assert!(parse_magic("fabfb5").is_err());
        assert!(parse_magic("zz").is_err());
    }
}

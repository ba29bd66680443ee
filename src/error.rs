//! Error taxonomy for the wire codec, entities and framing layer
//!
//! Every failure is local to the decode/encode call that produced it.
//! Nothing in this crate retries; callers decide what a failure means
//! for their connection.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WireError>;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed varint: {0}")]
    MalformedVarInt(String),
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },
    #[error("Invalid layout spec: {0}")]
    InvalidLayoutSpec(String),
    #[error("Invalid layout value: {0}")]
    InvalidLayoutValue(String),
    #[error("Invalid flags: {0}")]
    InvalidFlags(String),
    #[error("Oversized script: {size} bytes (max: {max})")]
    OversizedScript { size: usize, max: usize },
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Header length mismatch: {found} bytes (expected: {expected})")]
    HeaderLengthMismatch { expected: usize, found: usize },
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("Checksum mismatch: header {expected}, payload {computed}")]
    ChecksumMismatch { expected: String, computed: String },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Hash count {hashes} does not match {flags} set flag bits")]
    HashCountFlagMismatch { hashes: usize, flags: usize },
    #[error("Magic mismatch: expected {expected}, found {found}")]
    MagicMismatch { expected: String, found: String },
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Shorthand for a truncation error
    pub fn truncated(needed: usize, available: usize) -> Self {
        WireError::TruncatedInput { needed, available }
    }

    /// Whether more bytes could turn this failure into a success.
    ///
    /// Only `TruncatedInput` qualifies; every other kind means the bytes
    /// will never parse no matter what arrives next.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, WireError::TruncatedInput { .. })
    }
}

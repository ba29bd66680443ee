//! Auditchain: wire protocol and block model for an audit-mission P2P chain
//!
//! This crate provides:
//! - Codec primitives: compactSize varints, fixed struct layouts and the
//!   bit-reversed flag bitmap
//! - Transactions, blocks and the audit mission that opens every block
//! - An incremental Merkle tree that keeps block headers current as
//!   transactions are appended
//! - Message framing for 17 commands with checksum verification
//!
//! # Example
//!
//! ```rust
//! use auditchain::core::{AuditMission, BlockAssembler};
//! use auditchain::crypto::Hash256;
//! use auditchain::network::{decode_message, Message, Payload, DEFAULT_MAGIC};
//!
//! let mission = AuditMission::new(1, b"inspect".to_vec()).unwrap();
//! let block = BlockAssembler::new(Hash256::ZERO, 1_700_000_000, mission)
//!     .build()
//!     .unwrap();
//! assert!(block.verify_merkle_root());
//!
//! let bytes = Message::new(DEFAULT_MAGIC, Payload::Block(block)).serialize();
//! let (message, rest) = decode_message(&bytes).unwrap();
//! assert!(rest.is_empty());
//! println!("Decoded {} message", message.command());
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;

// Re-export commonly used types
pub use codec::{Encodable, FlagBitmap, Layout, VarInt};
pub use config::WireConfig;
pub use crate::core::{AuditMission, Block, BlockAssembler, BlockHeader, Transaction};
pub use crypto::{Hash256, MerkleTree};
pub use error::{Result, WireError};
pub use network::{decode_message, Message, MessageCodec, Payload};

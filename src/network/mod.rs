//! P2P wire protocol
//!
//! Turns byte buffers into typed messages and back. Sockets, peers and
//! message queues live with the caller; this module only frames.
//!
//! # Features
//! - 17 commands with NUL-padded 12-byte names
//! - 24-byte header with network magic and payload checksum
//! - Typed payloads for every command
//! - IPv4-mapped peer addresses and service flags
//! - `tokio_util` codec for stream transports

pub mod address;
pub mod codec;
pub mod command;
pub mod header;
pub mod message;
pub mod payload;

pub use address::{AddrEntry, NetworkAddress, ServiceFlags};
pub use codec::MessageCodec;
pub use command::{Command, COMMAND_SIZE};
pub use header::{MessageHeader, MESSAGE_HEADER_LAYOUT, MESSAGE_HEADER_SIZE};
pub use message::{checksum_for, decode_message, Message, DEFAULT_MAGIC};
pub use payload::{
    AddrPayload, HeadersPayload, InvPayload, Inventory, InventoryType, LocatorPayload,
    MerkleBlockPayload, Payload, PingPayload, VersionPayload, HEADERS_TRAILER,
};

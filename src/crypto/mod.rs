//! Hashing for the blockchain
//!
//! This module provides:
//! - SHA-256 and double SHA-256 over byte slices
//! - `Hash256`, the 32-byte digest type
//! - The incremental Merkle tree and its from-scratch reference reduction

pub mod hash;
pub mod merkle;

pub use hash::{double_sha256, serialize_hex, sha256, Hash256};
pub use merkle::{calculate_merkle_root, hash_pair, Level, MerkleProof, MerkleTree};

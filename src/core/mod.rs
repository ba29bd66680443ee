//! Core blockchain entities
//!
//! This module contains the value types carried on the wire:
//! - Transactions (outpoints, inputs, outputs)
//! - The audit mission occupying slot 0 of every block
//! - Block headers, blocks and the incremental block assembler

pub mod audit;
pub mod block;
pub mod transaction;

pub use audit::{AuditMission, AUDIT_INDEX, MAX_AUDIT_SCRIPT_SIZE};
pub use block::{Block, BlockAssembler, BlockHeader, BlockTransaction, BLOCK_HEADER_LAYOUT};
pub use transaction::{
    Outpoint, Transaction, TxIn, TxOut, MAX_PK_SCRIPT_SIZE, MAX_SIGNATURE_SCRIPT_SIZE,
    OUTPOINT_LAYOUT, SEQUENCE_FINAL, VERSION_DEFAULT,
};

//! Blocks, block headers and block assembly
//!
//! A block is a 72-byte header followed by a VarInt-counted transaction
//! list whose first slot holds the audit mission. There is no difficulty
//! target or nonce: blocks are not mined.

use crate::codec::{put_list, Encodable, Field, Layout, VarInt};
use crate::core::audit::AuditMission;
use crate::core::transaction::{Transaction, VERSION_DEFAULT};
use crate::crypto::{calculate_merkle_root, Hash256, MerkleTree};
use crate::error::{Result, WireError};
use bytes::BufMut;

// =============================================================================
// Block Header
// =============================================================================

/// version:u32 previous_block_hash[32] merkle_root_hash[32] time:u32
pub const BLOCK_HEADER_LAYOUT: Layout =
    Layout::from_static(&[Field::U32, Field::HASH, Field::HASH, Field::U32]);

/// Block header containing metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BlockHeader {
    pub version: u32,
    pub previous_block_hash: Hash256,
    pub merkle_root_hash: Hash256,
    /// Unix timestamp in seconds
    pub time: u32,
}

impl BlockHeader {
    pub fn new(previous_block_hash: Hash256, merkle_root_hash: Hash256, time: u32) -> Self {
        Self {
            version: VERSION_DEFAULT,
            previous_block_hash,
            merkle_root_hash,
            time,
        }
    }

    /// Header hash: single SHA-256 of the 72 serialized bytes
    pub fn hash(&self) -> Hash256 {
        self.content_hash()
    }
}

impl Encodable for BlockHeader {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.version);
        buf.put_slice(self.previous_block_hash.as_bytes());
        buf.put_slice(self.merkle_root_hash.as_bytes());
        buf.put_u32_le(self.time);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (mut fields, rest) = BLOCK_HEADER_LAYOUT.deserialize(data)?;
        Ok((
            Self {
                version: fields.u32()?,
                previous_block_hash: Hash256(fields.array()?),
                merkle_root_hash: Hash256(fields.array()?),
                time: fields.u32()?,
            },
            rest,
        ))
    }
}

// =============================================================================
// Block
// =============================================================================

/// A transaction slot in a block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTransaction {
    Audit(AuditMission),
    Regular(Transaction),
}

impl BlockTransaction {
    /// Decode the transaction in slot `index` of a block. Only slot 0 may
    /// hold an audit mission, recognised by its null outpoint marker;
    /// every later slot is read as a regular transaction.
    pub fn decode_slot(index: usize, data: &[u8]) -> Result<(Self, &[u8])> {
        if index == 0 && AuditMission::is_marked(data) {
            let (mission, rest) = AuditMission::decode(data)?;
            Ok((BlockTransaction::Audit(mission), rest))
        } else {
            let (tx, rest) = Transaction::decode(data)?;
            Ok((BlockTransaction::Regular(tx), rest))
        }
    }

    pub fn as_audit(&self) -> Option<&AuditMission> {
        match self {
            BlockTransaction::Audit(mission) => Some(mission),
            BlockTransaction::Regular(_) => None,
        }
    }
}

impl From<AuditMission> for BlockTransaction {
    fn from(mission: AuditMission) -> Self {
        BlockTransaction::Audit(mission)
    }
}

impl From<Transaction> for BlockTransaction {
    fn from(tx: Transaction) -> Self {
        BlockTransaction::Regular(tx)
    }
}

impl Encodable for BlockTransaction {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            BlockTransaction::Audit(mission) => mission.encode_into(buf),
            BlockTransaction::Regular(tx) => tx.encode_into(buf),
        }
    }

    /// Reads a block's first slot
    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        Self::decode_slot(0, data)
    }
}

/// A block: header plus ordered transactions
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<BlockTransaction>,
}

impl Block {
    /// Compose a block. An audit mission may only occupy slot 0.
    pub fn new(header: BlockHeader, transactions: Vec<BlockTransaction>) -> Result<Self> {
        let found = header.encoded_len();
        if found != BLOCK_HEADER_LAYOUT.len() {
            return Err(WireError::HeaderLengthMismatch {
                expected: BLOCK_HEADER_LAYOUT.len(),
                found,
            });
        }
        if let Some(pos) = transactions.iter().skip(1).position(|t| t.as_audit().is_some()) {
            return Err(WireError::ProtocolViolation(format!(
                "audit mission in slot {}; only slot 0 may hold one",
                pos + 1
            )));
        }
        Ok(Self {
            header,
            transactions,
        })
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[BlockTransaction] {
        &self.transactions
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn audit_mission(&self) -> Option<&AuditMission> {
        self.transactions.first().and_then(BlockTransaction::as_audit)
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Content hashes of the transactions, in block order
    pub fn leaf_hashes(&self) -> Vec<Hash256> {
        self.transactions.iter().map(Encodable::content_hash).collect()
    }

    /// Root of a Merkle tree grown over the block's transactions
    pub fn computed_merkle_root(&self) -> Hash256 {
        let leaves = self.leaf_hashes();
        MerkleTree::from_leaves(&leaves)
            .map(|tree| tree.root())
            .unwrap_or_else(|| calculate_merkle_root(&[]))
    }

    /// Verify the header's merkle root matches the transactions
    pub fn verify_merkle_root(&self) -> bool {
        self.header.merkle_root_hash == self.computed_merkle_root()
    }
}

impl Encodable for Block {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        put_list(buf, &self.transactions);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (header, rest) = BlockHeader::decode(data)?;
        let (count, mut rest) = VarInt::decode_len(rest)?;
        if count > rest.len() {
            return Err(WireError::truncated(count, rest.len()));
        }

        let mut transactions = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, tail) = BlockTransaction::decode_slot(index, rest)?;
            transactions.push(tx);
            rest = tail;
        }

        Ok((Self::new(header, transactions)?, rest))
    }
}

// =============================================================================
// Block Assembly
// =============================================================================

/// Builds a block one transaction at a time, keeping the header's merkle
/// root equal to the tree root after every push
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    header: BlockHeader,
    transactions: Vec<BlockTransaction>,
    tree: MerkleTree,
}

impl BlockAssembler {
    pub fn new(previous_block_hash: Hash256, time: u32, mission: AuditMission) -> Self {
        let tree = MerkleTree::new(mission.content_hash());
        Self {
            header: BlockHeader::new(previous_block_hash, tree.root(), time),
            transactions: vec![BlockTransaction::Audit(mission)],
            tree,
        }
    }

    /// Append a transaction. Returns false if the tree ignored it.
    pub fn push(&mut self, tx: Transaction) -> bool {
        if !self.tree.update(tx.content_hash()) {
            return false;
        }
        self.transactions.push(BlockTransaction::Regular(tx));
        self.header.merkle_root_hash = self.tree.root();
        log::trace!(
            "Assembled {} transactions, merkle root {}",
            self.transactions.len(),
            self.header.merkle_root_hash
        );
        true
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn merkle_root(&self) -> Hash256 {
        self.tree.root()
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn build(self) -> Result<Block> {
        Block::new(self.header, self.transactions)
    }
}

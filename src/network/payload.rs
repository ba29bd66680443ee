//! Message payloads
//!
//! One struct per distinct payload shape. Commands that share a shape
//! share a struct: `inv`, `getdata` and `notfound` all carry an
//! [`InvPayload`]; `getblocks` and `getheaders` a [`LocatorPayload`];
//! `ping` and `pong` a [`PingPayload`]. [`Payload`] tags each with its
//! command.

use crate::codec::{
    put_list, take_array, take_list, take_u32, take_u64, Encodable, FlagBitmap, VarInt,
};
use crate::core::{Block, BlockHeader, Transaction};
use crate::crypto::Hash256;
use crate::error::{Result, WireError};
use crate::network::address::{AddrEntry, NetworkAddress, ServiceFlags};
use crate::network::command::Command;
use bytes::BufMut;
use chrono::Utc;

/// Byte closing every `headers` payload
pub const HEADERS_TRAILER: u8 = 0x00;

// =============================================================================
// version
// =============================================================================

/// Handshake opener
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VersionPayload {
    pub version: u32,
    pub services: ServiceFlags,
    pub timestamp: u64,
    pub receiver: NetworkAddress,
    pub transmitter: NetworkAddress,
    /// Random per-connection identifier used to detect self-connections
    pub nonce: u64,
    pub start_height: u32,
}

impl VersionPayload {
    /// Version payload stamped with the current time and a random nonce
    pub fn new(
        version: u32,
        services: ServiceFlags,
        receiver: NetworkAddress,
        transmitter: NetworkAddress,
        start_height: u32,
    ) -> Self {
        Self {
            version,
            services,
            timestamp: Utc::now().timestamp().max(0) as u64,
            receiver,
            transmitter,
            nonce: rand::random(),
            start_height,
        }
    }
}

impl Encodable for VersionPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.version);
        buf.put_u64_le(self.services.bits());
        buf.put_u64_le(self.timestamp);
        self.receiver.encode_into(buf);
        self.transmitter.encode_into(buf);
        buf.put_u64_le(self.nonce);
        buf.put_u32_le(self.start_height);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (version, rest) = take_u32(data)?;
        let (services, rest) = take_u64(rest)?;
        let (timestamp, rest) = take_u64(rest)?;
        let (receiver, rest) = NetworkAddress::decode(rest)?;
        let (transmitter, rest) = NetworkAddress::decode(rest)?;
        let (nonce, rest) = take_u64(rest)?;
        let (start_height, rest) = take_u32(rest)?;
        Ok((
            Self {
                version,
                services: ServiceFlags::from_bits_retain(services),
                timestamp,
                receiver,
                transmitter,
                nonce,
                start_height,
            },
            rest,
        ))
    }
}

// =============================================================================
// addr
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AddrPayload {
    pub entries: Vec<AddrEntry>,
}

impl Encodable for AddrPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        put_list(buf, &self.entries);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (entries, rest) = take_list(data)?;
        Ok((Self { entries }, rest))
    }
}

// =============================================================================
// inv / getdata / notfound
// =============================================================================

const WITNESS_FLAG: u32 = 0x4000_0000;

/// Kind of object an inventory vector names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryType {
    Tx,
    Block,
    FilteredBlock,
    CompactBlock,
    WitnessTx,
    WitnessBlock,
    FilteredWitnessBlock,
    /// Identifier this node does not know, kept so it can be relayed
    Other(u32),
}

impl InventoryType {
    pub const MSG_TX: u32 = 1;
    pub const MSG_BLOCK: u32 = 2;
    pub const MSG_FILTERED_BLOCK: u32 = 3;
    pub const MSG_CMPCT_BLOCK: u32 = 4;

    pub fn from_u32(value: u32) -> Self {
        match value {
            Self::MSG_TX => InventoryType::Tx,
            Self::MSG_BLOCK => InventoryType::Block,
            Self::MSG_FILTERED_BLOCK => InventoryType::FilteredBlock,
            Self::MSG_CMPCT_BLOCK => InventoryType::CompactBlock,
            v if v == Self::MSG_TX | WITNESS_FLAG => InventoryType::WitnessTx,
            v if v == Self::MSG_BLOCK | WITNESS_FLAG => InventoryType::WitnessBlock,
            v if v == Self::MSG_FILTERED_BLOCK | WITNESS_FLAG => {
                InventoryType::FilteredWitnessBlock
            }
            other => InventoryType::Other(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match *self {
            InventoryType::Tx => Self::MSG_TX,
            InventoryType::Block => Self::MSG_BLOCK,
            InventoryType::FilteredBlock => Self::MSG_FILTERED_BLOCK,
            InventoryType::CompactBlock => Self::MSG_CMPCT_BLOCK,
            InventoryType::WitnessTx => Self::MSG_TX | WITNESS_FLAG,
            InventoryType::WitnessBlock => Self::MSG_BLOCK | WITNESS_FLAG,
            InventoryType::FilteredWitnessBlock => Self::MSG_FILTERED_BLOCK | WITNESS_FLAG,
            InventoryType::Other(value) => value,
        }
    }
}

/// Inventory vector: type identifier plus object hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Inventory {
    pub kind: InventoryType,
    pub hash: Hash256,
}

impl Inventory {
    pub fn new(kind: InventoryType, hash: Hash256) -> Self {
        Self { kind, hash }
    }
}

impl Encodable for Inventory {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.kind.as_u32());
        buf.put_slice(self.hash.as_bytes());
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (kind, rest) = take_u32(data)?;
        let (hash, rest) = Hash256::decode(rest)?;
        Ok((
            Self {
                kind: InventoryType::from_u32(kind),
                hash,
            },
            rest,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InvPayload {
    pub inventory: Vec<Inventory>,
}

impl Encodable for InvPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        put_list(buf, &self.inventory);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (inventory, rest) = take_list(data)?;
        Ok((Self { inventory }, rest))
    }
}

// =============================================================================
// getblocks / getheaders
// =============================================================================

/// Block locator: known hashes, newest first, up to `stop_hash`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LocatorPayload {
    pub version: u32,
    pub locator_hashes: Vec<Hash256>,
    /// Zero asks for as many as the peer will send
    pub stop_hash: Hash256,
}

impl Encodable for LocatorPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.version);
        put_list(buf, &self.locator_hashes);
        self.stop_hash.encode_into(buf);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (version, rest) = take_u32(data)?;
        let (locator_hashes, rest) = take_list(rest)?;
        let (stop_hash, rest) = Hash256::decode(rest)?;
        Ok((
            Self {
                version,
                locator_hashes,
                stop_hash,
            },
            rest,
        ))
    }
}

// =============================================================================
// headers
// =============================================================================

/// Block headers followed by a single zero byte
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeadersPayload {
    pub headers: Vec<BlockHeader>,
}

impl Encodable for HeadersPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        put_list(buf, &self.headers);
        buf.put_u8(HEADERS_TRAILER);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (headers, rest) = take_list(data)?;
        let ([trailer], rest) = take_array::<1>(rest)?;
        if trailer != HEADERS_TRAILER {
            return Err(WireError::ProtocolViolation(format!(
                "headers trailer is {:#04x}, expected {:#04x}",
                trailer, HEADERS_TRAILER
            )));
        }
        Ok((Self { headers }, rest))
    }
}

// =============================================================================
// merkleblock
// =============================================================================

/// Block header plus the partial Merkle tree selecting some transactions
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MerkleBlockPayload {
    header: BlockHeader,
    transaction_count: u64,
    hashes: Vec<Hash256>,
    flags: FlagBitmap,
}

impl MerkleBlockPayload {
    /// Fails with `HashCountFlagMismatch` unless one hash is given per set flag
    pub fn new(
        header: BlockHeader,
        transaction_count: u64,
        hashes: Vec<Hash256>,
        flags: FlagBitmap,
    ) -> Result<Self> {
        if hashes.len() != flags.bit_count() {
            return Err(WireError::HashCountFlagMismatch {
                hashes: hashes.len(),
                flags: flags.bit_count(),
            });
        }
        Ok(Self {
            header,
            transaction_count,
            hashes,
            flags,
        })
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    pub fn hashes(&self) -> &[Hash256] {
        &self.hashes
    }

    pub fn flags(&self) -> &FlagBitmap {
        &self.flags
    }
}

impl Encodable for MerkleBlockPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.header.encode_into(buf);
        VarInt::new(self.transaction_count).encode_into(buf);
        put_list(buf, &self.hashes);
        let flags = self.flags.serialize();
        VarInt::from_len(flags.len()).encode_into(buf);
        buf.put_slice(&flags);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (header, rest) = BlockHeader::decode(data)?;
        let (transaction_count, rest) = VarInt::decode(rest)?;
        let (hashes, rest) = take_list(rest)?;
        let (flag_bytes, rest) = VarInt::decode_len(rest)?;
        let (flags, rest) = FlagBitmap::deserialize(rest, flag_bytes)?;
        Ok((
            Self::new(header, transaction_count.value(), hashes, flags)?,
            rest,
        ))
    }
}

// =============================================================================
// ping / pong
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PingPayload {
    pub nonce: u64,
}

impl PingPayload {
    pub fn new(nonce: u64) -> Self {
        Self { nonce }
    }

    pub fn random() -> Self {
        Self {
            nonce: rand::random(),
        }
    }
}

impl Encodable for PingPayload {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u64_le(self.nonce);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (nonce, rest) = take_u64(data)?;
        Ok((Self { nonce }, rest))
    }
}

// =============================================================================
// Payload
// =============================================================================

/// A typed payload for each of the 17 commands
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "command", content = "payload", rename_all = "lowercase")]
pub enum Payload {
    Block(Block),
    GetBlocks(LocatorPayload),
    Inv(InvPayload),
    GetData(InvPayload),
    GetHeaders(LocatorPayload),
    Headers(HeadersPayload),
    MerkleBlock(MerkleBlockPayload),
    Mempool,
    Tx(Transaction),
    NotFound(InvPayload),
    Addr(AddrPayload),
    GetAddr,
    Ping(PingPayload),
    Pong(PingPayload),
    SendHeaders,
    Verack,
    Version(VersionPayload),
}

impl Payload {
    pub fn command(&self) -> Command {
        match self {
            Payload::Block(_) => Command::Block,
            Payload::GetBlocks(_) => Command::GetBlocks,
            Payload::Inv(_) => Command::Inv,
            Payload::GetData(_) => Command::GetData,
            Payload::GetHeaders(_) => Command::GetHeaders,
            Payload::Headers(_) => Command::Headers,
            Payload::MerkleBlock(_) => Command::MerkleBlock,
            Payload::Mempool => Command::Mempool,
            Payload::Tx(_) => Command::Tx,
            Payload::NotFound(_) => Command::NotFound,
            Payload::Addr(_) => Command::Addr,
            Payload::GetAddr => Command::GetAddr,
            Payload::Ping(_) => Command::Ping,
            Payload::Pong(_) => Command::Pong,
            Payload::SendHeaders => Command::SendHeaders,
            Payload::Verack => Command::Verack,
            Payload::Version(_) => Command::Version,
        }
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Payload::Block(block) => block.encode_into(buf),
            Payload::GetBlocks(p) | Payload::GetHeaders(p) => p.encode_into(buf),
            Payload::Inv(p) | Payload::GetData(p) | Payload::NotFound(p) => p.encode_into(buf),
            Payload::Headers(p) => p.encode_into(buf),
            Payload::MerkleBlock(p) => p.encode_into(buf),
            Payload::Tx(tx) => tx.encode_into(buf),
            Payload::Addr(p) => p.encode_into(buf),
            Payload::Ping(p) | Payload::Pong(p) => p.encode_into(buf),
            Payload::Version(p) => p.encode_into(buf),
            Payload::Mempool | Payload::GetAddr | Payload::SendHeaders | Payload::Verack => {}
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Decode the payload shape `command` names from the front of `data`
    pub fn decode(command: Command, data: &[u8]) -> Result<(Self, &[u8])> {
        fn wrap<T>(
            parsed: Result<(T, &[u8])>,
            variant: fn(T) -> Payload,
        ) -> Result<(Payload, &[u8])> {
            parsed.map(|(value, rest)| (variant(value), rest))
        }

        match command {
            Command::Block => wrap(Block::decode(data), Payload::Block),
            Command::GetBlocks => wrap(LocatorPayload::decode(data), Payload::GetBlocks),
            Command::Inv => wrap(InvPayload::decode(data), Payload::Inv),
            Command::GetData => wrap(InvPayload::decode(data), Payload::GetData),
            Command::GetHeaders => wrap(LocatorPayload::decode(data), Payload::GetHeaders),
            Command::Headers => wrap(HeadersPayload::decode(data), Payload::Headers),
            Command::MerkleBlock => wrap(MerkleBlockPayload::decode(data), Payload::MerkleBlock),
            Command::Tx => wrap(Transaction::decode(data), Payload::Tx),
            Command::NotFound => wrap(InvPayload::decode(data), Payload::NotFound),
            Command::Addr => wrap(AddrPayload::decode(data), Payload::Addr),
            Command::Ping => wrap(PingPayload::decode(data), Payload::Ping),
            Command::Pong => wrap(PingPayload::decode(data), Payload::Pong),
            Command::Version => wrap(VersionPayload::decode(data), Payload::Version),
            Command::Mempool => Ok((Payload::Mempool, data)),
            Command::GetAddr => Ok((Payload::GetAddr, data)),
            Command::SendHeaders => Ok((Payload::SendHeaders, data)),
            Command::Verack => Ok((Payload::Verack, data)),
        }
    }
}

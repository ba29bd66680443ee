//! Transactions
//!
//! Wire layout (all integers little-endian):
//!
//! ```text
//! Outpoint    := hash[32] index:u32
//! TxIn        := Outpoint varint(script_len) signature_script sequence:u32
//! TxOut       := value:u64 varint(script_len) pk_script
//! Transaction := version:u32 varint(n) TxIn*n varint(m) TxOut*m lock_time:u32
//! ```
//!
//! Unsigned field types make negative values and lock times
//! unrepresentable, so only script sizes are checked at construction.

use crate::codec::{
    put_list, put_var_bytes, take_list, take_u32, take_var_bytes, Encodable, Field, Layout,
};
use crate::crypto::{serialize_hex, Hash256};
use crate::error::{Result, WireError};
use bytes::BufMut;

// =============================================================================
// Constants
// =============================================================================

/// Default transaction and block version
pub const VERSION_DEFAULT: u32 = 1;

/// The only sequence value this network accepts
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

pub const MAX_SIGNATURE_SCRIPT_SIZE: usize = 10_000;
pub const MAX_PK_SCRIPT_SIZE: usize = 10_000;

pub const OUTPOINT_LAYOUT: Layout = Layout::from_static(&[Field::HASH, Field::U32]);

fn check_script(script: &[u8], max: usize) -> Result<()> {
    if script.len() > max {
        return Err(WireError::OversizedScript {
            size: script.len(),
            max,
        });
    }
    Ok(())
}

fn take_sequence(data: &[u8]) -> Result<&[u8]> {
    let (sequence, rest) = take_u32(data)?;
    if sequence != SEQUENCE_FINAL {
        return Err(WireError::ProtocolViolation(format!(
            "sequence {:#010x} is not final",
            sequence
        )));
    }
    Ok(rest)
}

// =============================================================================
// Outpoint
// =============================================================================

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Outpoint {
    pub hash: Hash256,
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: Hash256, index: u32) -> Self {
        Self { hash, index }
    }
}

impl Encodable for Outpoint {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.hash.as_bytes());
        buf.put_u32_le(self.index);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (mut fields, rest) = OUTPOINT_LAYOUT.deserialize(data)?;
        let hash = Hash256(fields.array()?);
        let index = fields.u32()?;
        Ok((Self { hash, index }, rest))
    }

    fn encoded_len(&self) -> usize {
        OUTPOINT_LAYOUT.len()
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input spending a previous output
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TxIn {
    previous_output: Outpoint,
    #[serde(serialize_with = "serialize_hex")]
    signature_script: Vec<u8>,
}

impl TxIn {
    pub fn new(previous_output: Outpoint, signature_script: Vec<u8>) -> Result<Self> {
        check_script(&signature_script, MAX_SIGNATURE_SCRIPT_SIZE)?;
        Ok(Self {
            previous_output,
            signature_script,
        })
    }

    pub fn previous_output(&self) -> &Outpoint {
        &self.previous_output
    }

    pub fn signature_script(&self) -> &[u8] {
        &self.signature_script
    }

    /// Always `SEQUENCE_FINAL`
    pub fn sequence(&self) -> u32 {
        SEQUENCE_FINAL
    }
}

impl Encodable for TxIn {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.previous_output.encode_into(buf);
        put_var_bytes(buf, &self.signature_script);
        buf.put_u32_le(SEQUENCE_FINAL);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (previous_output, rest) = Outpoint::decode(data)?;
        let (signature_script, rest) = take_var_bytes(rest, MAX_SIGNATURE_SCRIPT_SIZE)?;
        let rest = take_sequence(rest)?;
        Ok((
            Self {
                previous_output,
                signature_script,
            },
            rest,
        ))
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TxOut {
    value: u64,
    #[serde(serialize_with = "serialize_hex")]
    pk_script: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, pk_script: Vec<u8>) -> Result<Self> {
        check_script(&pk_script, MAX_PK_SCRIPT_SIZE)?;
        Ok(Self { value, pk_script })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn pk_script(&self) -> &[u8] {
        &self.pk_script
    }
}

impl Encodable for TxOut {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u64_le(self.value);
        put_var_bytes(buf, &self.pk_script);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (mut fields, rest) = Layout::from_static(&[Field::U64]).deserialize(data)?;
        let value = fields.u64()?;
        let (pk_script, rest) = take_var_bytes(rest, MAX_PK_SCRIPT_SIZE)?;
        Ok((Self { value, pk_script }, rest))
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A regular transaction
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self {
            version: VERSION_DEFAULT,
            inputs,
            outputs,
            lock_time,
        }
    }

    /// Identity hash: single SHA-256 of the serialized form
    pub fn hash(&self) -> Hash256 {
        self.content_hash()
    }
}

impl Encodable for Transaction {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.version);
        put_list(buf, &self.inputs);
        put_list(buf, &self.outputs);
        buf.put_u32_le(self.lock_time);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (version, rest) = take_u32(data)?;
        let (inputs, rest) = take_list(rest)?;
        let (outputs, rest) = take_list(rest)?;
        let (lock_time, rest) = take_u32(rest)?;
        Ok((
            Self {
                version,
                inputs,
                outputs,
                lock_time,
            },
            rest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;

    fn sample_tx() -> Transaction {
        let input = TxIn::new(Outpoint::new(sha256(b"prev"), 0), b"sig".to_vec()).unwrap();
        let output = TxOut::new(50, b"pk".to_vec()).unwrap();
        Transaction::new(vec![input], vec![output], 0)
    }

    #[test]
    fn test_outpoint_layout() {
        let outpoint = Outpoint::new(sha256(b"prev"), 7);
        let bytes = outpoint.serialize();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[32..], &7u32.to_le_bytes());
        assert_eq!(outpoint.encoded_len(), 36);
    }

    #[test]
    fn test_transaction_wire_form() {
        let tx = sample_tx();
        let bytes = tx.serialize();
        // version + count + txin(36+1+3+4) + count + txout(8+1+2) + lock_time
        assert_eq!(bytes.len(), 4 + 1 + 44 + 1 + 11 + 4);
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
        // sequence closes the input
        assert_eq!(&bytes[45..49], &[0xFF; 4]);
        assert_eq!(&bytes[bytes.len() - 6..], &[b'p', b'k', 0, 0, 0, 0]);
    }

    #[test]
    fn test_transaction_decode_with_trailing() {
        let tx = sample_tx();
        let mut bytes = tx.serialize();
        bytes.extend_from_slice(&[0xAB, 0xCD]);

        let (decoded, rest) = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(rest, &[0xAB, 0xCD]);
        assert_eq!(decoded.hash(), sha256(&tx.serialize()));
    }

    #[test]
    fn test_oversized_scripts_rejected() {
        let outpoint = Outpoint::new(Hash256::ZERO, 0);
        assert!(matches!(
            TxIn::new(outpoint, vec![0; MAX_SIGNATURE_SCRIPT_SIZE + 1]),
            Err(WireError::OversizedScript { size: 10_001, max: 10_000 })
        ));
        assert!(TxIn::new(outpoint, vec![0; MAX_SIGNATURE_SCRIPT_SIZE]).is_ok());
        assert!(matches!(
            TxOut::new(1, vec![0; MAX_PK_SCRIPT_SIZE + 1]),
            Err(WireError::OversizedScript { .. })
        ));
    }

    #[test]
    fn test_non_final_sequence_rejected() {
        let input = TxIn::new(Outpoint::new(Hash256::ZERO, 1), vec![1, 2]).unwrap();
        let mut bytes = input.serialize();
        let n = bytes.len();
        bytes[n - 1] = 0xFE;

        assert!(matches!(
            TxIn::decode(&bytes),
            Err(WireError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_truncated_transaction() {
        let bytes = sample_tx().serialize();
        let err = Transaction::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_incomplete());
    }
}

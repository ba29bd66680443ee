//! The audit mission: the privileged first transaction of every block
//!
//! It plays the role a coinbase plays in Bitcoin and is laid out so that
//! it reads like a `TxIn` spending the null outpoint:
//!
//! ```text
//! null_hash[32] 0xFFFFFFFF varint(len(height) + len(script)) varint(height) script 0xFFFFFFFF
//! ```

use crate::codec::{take_bytes, Encodable, Field, Layout, VarInt};
use crate::core::transaction::{Outpoint, OUTPOINT_LAYOUT, SEQUENCE_FINAL};
use crate::crypto::{serialize_hex, Hash256};
use crate::error::{Result, WireError};
use bytes::BufMut;

/// Index written in the outpoint slot of an audit mission
pub const AUDIT_INDEX: u32 = 0xFFFF_FFFF;

/// Cap on the combined height + script payload
pub const MAX_AUDIT_SCRIPT_SIZE: usize = 100;

/// Block height plus an opaque mission script
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AuditMission {
    height: VarInt,
    #[serde(serialize_with = "serialize_hex")]
    script: Vec<u8>,
}

impl AuditMission {
    pub fn new(height: u64, script: Vec<u8>) -> Result<Self> {
        let height = VarInt::new(height);
        let size = height.encoded_len() + script.len();
        if size > MAX_AUDIT_SCRIPT_SIZE {
            return Err(WireError::OversizedScript {
                size,
                max: MAX_AUDIT_SCRIPT_SIZE,
            });
        }
        Ok(Self { height, script })
    }

    pub fn height(&self) -> u64 {
        self.height.value()
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// The marker written where a real outpoint would go
    pub fn null_outpoint() -> Outpoint {
        Outpoint::new(Hash256::ZERO, AUDIT_INDEX)
    }

    /// Whether `data` starts with the audit outpoint marker
    pub fn is_marked(data: &[u8]) -> bool {
        data.len() >= OUTPOINT_LAYOUT.len()
            && data[..32].iter().all(|b| *b == 0)
            && data[32..36] == AUDIT_INDEX.to_le_bytes()
    }

    fn payload_len(&self) -> usize {
        self.height.encoded_len() + self.script.len()
    }
}

impl Encodable for AuditMission {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        Self::null_outpoint().encode_into(buf);
        VarInt::from_len(self.payload_len()).encode_into(buf);
        self.height.encode_into(buf);
        buf.put_slice(&self.script);
        buf.put_u32_le(SEQUENCE_FINAL);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (outpoint, rest) = Outpoint::decode(data)?;
        if outpoint != Self::null_outpoint() {
            return Err(WireError::ProtocolViolation(format!(
                "audit mission must spend the null outpoint, found {}:{}",
                outpoint.hash, outpoint.index
            )));
        }

        let (payload_len, rest) = VarInt::decode_len(rest)?;
        if payload_len > MAX_AUDIT_SCRIPT_SIZE {
            return Err(WireError::OversizedScript {
                size: payload_len,
                max: MAX_AUDIT_SCRIPT_SIZE,
            });
        }
        // height and script are both inside the declared payload
        let (payload, _) = take_bytes(rest, payload_len)?;
        let (height, tail) = VarInt::decode(payload)?;
        let script_len = tail.len();

        let rest = &rest[height.encoded_len()..];
        let layout = Layout::new(vec![Field::Bytes(script_len), Field::U32])?;
        let (mut fields, rest) = layout.deserialize(rest)?;
        let script = fields.bytes()?;
        let sequence = fields.u32()?;
        if sequence != SEQUENCE_FINAL {
            return Err(WireError::ProtocolViolation(format!(
                "audit mission sequence {:#010x} is not final",
                sequence
            )));
        }

        Ok((Self { height, script }, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TxIn;
    use crate::crypto::sha256;

    #[test]
    fn test_wire_form() {
        let mission = AuditMission::new(300, b"audit".to_vec()).unwrap();
        let bytes = mission.serialize();

        assert!(bytes[..32].iter().all(|b| *b == 0));
        assert_eq!(&bytes[32..36], &[0xFF; 4]);
        // payload length covers the 3-byte height varint and the script
        assert_eq!(bytes[36], 8);
        assert_eq!(&bytes[37..40], &[0xFD, 0x2C, 0x01]);
        assert_eq!(&bytes[40..45], b"audit");
        assert_eq!(&bytes[45..], &[0xFF; 4]);
        assert!(AuditMission::is_marked(&bytes));
    }

    #[test]
    fn test_decodes_and_reads_as_txin() {
        let mission = AuditMission::new(7, vec![0xAA; 20]).unwrap();
        let mut bytes = mission.serialize();
        bytes.push(0x55);

        let (decoded, rest) = AuditMission::decode(&bytes).unwrap();
        assert_eq!(decoded, mission);
        assert_eq!(rest, &[0x55]);
        assert_eq!(decoded.content_hash(), sha256(&mission.serialize()));

        let (as_input, rest) = TxIn::decode(&bytes).unwrap();
        assert_eq!(as_input.previous_output(), &AuditMission::null_outpoint());
        assert_eq!(rest, &[0x55]);
    }

    #[test]
    fn test_oversized_payload() {
        // one height byte plus 99 script bytes is exactly the cap
        assert!(AuditMission::new(1, vec![0; 99]).is_ok());
        assert!(matches!(
            AuditMission::new(1, vec![0; 100]),
            Err(WireError::OversizedScript { size: 101, max: 100 })
        ));
    }

    #[test]
    fn test_non_null_outpoint_rejected() {
        let mut bytes = AuditMission::new(1, b"x".to_vec()).unwrap().serialize();
        bytes[0] = 1;
        assert!(matches!(
            AuditMission::decode(&bytes),
            Err(WireError::ProtocolViolation(_))
        ));

        let mut bytes = AuditMission::new(1, b"x".to_vec()).unwrap().serialize();
        bytes[32] = 0;
        assert!(matches!(
            AuditMission::decode(&bytes),
            Err(WireError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_bad_sequence_rejected() {
        let mut bytes = AuditMission::new(1, b"x".to_vec()).unwrap().serialize();
        let n = bytes.len();
        bytes[n - 4] = 0;
        assert!(matches!(
            AuditMission::decode(&bytes),
            Err(WireError::ProtocolViolation(_))
        ));
    }
}

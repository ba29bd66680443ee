//! The 24-byte message header
//!
//! ```text
//! magic[4] command[12] payload_length:u32 checksum[4]
//! ```

use crate::codec::{Encodable, Field, Layout};
use crate::crypto::serialize_hex;
use crate::error::Result;
use crate::network::command::COMMAND_SIZE;
use bytes::BufMut;

pub const MESSAGE_HEADER_LAYOUT: Layout = Layout::from_static(&[
    Field::Bytes(4),
    Field::Bytes(COMMAND_SIZE),
    Field::U32,
    Field::Bytes(4),
]);

/// Encoded header size
pub const MESSAGE_HEADER_SIZE: usize = 24;

/// Message header as read off the wire; the command is not yet validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MessageHeader {
    #[serde(serialize_with = "serialize_hex")]
    pub magic: [u8; 4],
    #[serde(serialize_with = "serialize_hex")]
    pub command: [u8; COMMAND_SIZE],
    pub payload_length: u32,
    #[serde(serialize_with = "serialize_hex")]
    pub checksum: [u8; 4],
}

impl Encodable for MessageHeader {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_slice(&self.magic);
        buf.put_slice(&self.command);
        buf.put_u32_le(self.payload_length);
        buf.put_slice(&self.checksum);
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (mut fields, rest) = MESSAGE_HEADER_LAYOUT.deserialize(data)?;
        Ok((
            Self {
                magic: fields.array()?,
                command: fields.array()?,
                payload_length: fields.u32()?,
                checksum: fields.array()?,
            },
            rest,
        ))
    }

    fn encoded_len(&self) -> usize {
        MESSAGE_HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(MESSAGE_HEADER_LAYOUT.len(), MESSAGE_HEADER_SIZE);
    }

    #[test]
    fn test_header_fields() {
        let header = MessageHeader {
            magic: [0xFA, 0xBF, 0xB5, 0xDA],
            command: *b"verack\0\0\0\0\0\0",
            payload_length: 0x0102,
            checksum: [1, 2, 3, 4],
        };
        let bytes = header.serialize();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[16..20], &[0x02, 0x01, 0, 0]);

        let (decoded, rest) = MessageHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(rest.is_empty());
        assert!(MessageHeader::decode(&bytes[..23]).unwrap_err().is_incomplete());
    }
}

//! Framed messages and the decode state machine
//!
//! A message is a [`MessageHeader`] followed by exactly `payload_length`
//! payload bytes. Decoding moves through three stages and stops at the
//! first failure:
//!
//! 1. header: 24 bytes, command looked up in the fixed table
//! 2. payload: the announced window must be present and its checksum
//!    must match before any parsing happens
//! 3. verified: the typed payload consumed the whole window and
//!    re-serializes to bytes with the same checksum
//!
//! Bytes past the window are handed back untouched.

use crate::codec::Encodable;
use crate::crypto::{double_sha256, serialize_hex, sha256};
use crate::error::{Result, WireError};
use crate::network::command::Command;
use crate::network::header::{MessageHeader, MESSAGE_HEADER_SIZE};
use crate::network::payload::{Payload, PingPayload};

/// Network magic of the default network
pub const DEFAULT_MAGIC: [u8; 4] = [0xFA, 0xBF, 0xB5, 0xDA];

/// Checksum carried in the header for `payload` sent under `command`.
///
/// First four bytes of SHA-256 over the payload. Commands with an empty
/// payload (`verack`, `getaddr`, `mempool`, `sendheaders`) use double
/// SHA-256 instead, which existing peers expect on the wire.
pub fn checksum_for(command: Command, payload: &[u8]) -> [u8; 4] {
    let digest = if command.has_empty_payload() {
        double_sha256(payload)
    } else {
        sha256(payload)
    };
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

/// A network message: magic plus typed payload
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    #[serde(serialize_with = "serialize_hex")]
    pub magic: [u8; 4],
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    pub fn new(magic: [u8; 4], payload: Payload) -> Self {
        Self { magic, payload }
    }

    pub fn ping(magic: [u8; 4], nonce: u64) -> Self {
        Self::new(magic, Payload::Ping(PingPayload::new(nonce)))
    }

    pub fn pong(magic: [u8; 4], nonce: u64) -> Self {
        Self::new(magic, Payload::Pong(PingPayload::new(nonce)))
    }

    pub fn command(&self) -> Command {
        self.payload.command()
    }

    /// Header describing the current payload
    pub fn header(&self) -> MessageHeader {
        let payload = self.payload.serialize();
        self.header_for(&payload)
    }

    fn header_for(&self, payload: &[u8]) -> MessageHeader {
        let command = self.command();
        MessageHeader {
            magic: self.magic,
            command: command.to_bytes(),
            payload_length: payload.len() as u32,
            checksum: checksum_for(command, payload),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let payload = self.payload.serialize();
        let mut out = Vec::with_capacity(MESSAGE_HEADER_SIZE + payload.len());
        self.header_for(&payload).encode_into(&mut out);
        out.extend_from_slice(&payload);
        out
    }

    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        decode_message(data)
    }
}

/// Decode one framed message from the front of `data`.
///
/// Returns the message and every byte after its payload window. Fails
/// with `TruncatedInput` while the header or the window is incomplete.
pub fn decode_message(data: &[u8]) -> Result<(Message, &[u8])> {
    let (header, rest) = MessageHeader::decode(data)?;
    let command = Command::from_bytes(&header.command)?;

    let length = header.payload_length as usize;
    if rest.len() < length {
        return Err(WireError::truncated(MESSAGE_HEADER_SIZE + length, data.len()));
    }
    let (window, trailing) = rest.split_at(length);

    let computed = checksum_for(command, window);
    if computed != header.checksum {
        log::warn!(
            "Checksum mismatch on {} ({} bytes): header {}, payload {}",
            command,
            length,
            hex::encode(header.checksum),
            hex::encode(computed)
        );
        return Err(WireError::ChecksumMismatch {
            expected: hex::encode(header.checksum),
            computed: hex::encode(computed),
        });
    }

    // the window is complete, so running short inside it can never be fixed
    // by more input
    let (payload, leftover) = Payload::decode(command, window).map_err(|e| match e {
        WireError::TruncatedInput { needed, available } => WireError::ProtocolViolation(format!(
            "{} payload is short: needed {} bytes, {} in the window",
            command, needed, available
        )),
        other => other,
    })?;
    if !leftover.is_empty() {
        return Err(WireError::ProtocolViolation(format!(
            "{} payload left {} of {} bytes unread",
            command,
            leftover.len(),
            length
        )));
    }

    // the parsed payload must reproduce the bytes it was read from
    let reserialized = checksum_for(command, &payload.serialize());
    if reserialized != header.checksum {
        log::warn!("{} payload does not re-serialize to its checksum", command);
        return Err(WireError::ChecksumMismatch {
            expected: hex::encode(header.checksum),
            computed: hex::encode(reserialized),
        });
    }

    log::debug!("Decoded {} message ({} payload bytes)", command, length);

    Ok((
        Message {
            magic: header.magic,
            payload,
        },
        trailing,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::header::MESSAGE_HEADER_LAYOUT;

    #[test]
    fn test_ping_frame() {
        let msg = Message::ping(DEFAULT_MAGIC, 0x1122_3344_5566_7788);
        let bytes = msg.serialize();

        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &[0xFA, 0xBF, 0xB5, 0xDA]);
        assert_eq!(&bytes[4..16], b"ping\0\0\0\0\0\0\0\0");
        assert_eq!(&bytes[16..20], &[8, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &sha256(&bytes[24..]).as_bytes()[..4]);
        assert_eq!(&bytes[24..], &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);

        let (decoded, rest) = decode_message(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_empty_payload_uses_double_hash() {
        let msg = Message::new(DEFAULT_MAGIC, Payload::Verack);
        let bytes = msg.serialize();
        assert_eq!(bytes.len(), MESSAGE_HEADER_LAYOUT.len());
        assert_eq!(&bytes[20..24], &[0x5d, 0xf6, 0xe0, 0xe2]);
        assert_eq!(decode_message(&bytes).unwrap().0, msg);

        // a verack framed with the single-hash checksum is rejected
        let mut single = bytes.clone();
        single[20..24].copy_from_slice(&sha256(b"").as_bytes()[..4]);
        assert!(matches!(
            decode_message(&single),
            Err(WireError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_returned() {
        let first = Message::ping(DEFAULT_MAGIC, 1);
        let second = Message::pong(DEFAULT_MAGIC, 1);
        let mut bytes = first.serialize();
        bytes.extend_from_slice(&second.serialize());

        let (decoded, rest) = decode_message(&bytes).unwrap();
        assert_eq!(decoded, first);
        let (decoded, rest) = decode_message(rest).unwrap();
        assert_eq!(decoded, second);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_truncated_frames() {
        let bytes = Message::ping(DEFAULT_MAGIC, 9).serialize();
        for cut in [0, 10, 23, 24, 31] {
            let err = decode_message(&bytes[..cut]).unwrap_err();
            assert!(err.is_incomplete(), "cut at {}: {}", cut, err);
        }
    }

    #[test]
    fn test_unknown_command_before_payload() {
        let mut bytes = Message::ping(DEFAULT_MAGIC, 9).serialize();
        bytes[4..16].copy_from_slice(b"unknown_cmd\0");
        // even with the payload missing, the command is what fails
        assert!(matches!(
            decode_message(&bytes[..24]),
            Err(WireError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_short_payload_in_complete_window_is_final() {
        // a ping announcing and carrying only 4 of its 8 nonce bytes
        let payload = [1u8, 2, 3, 4];
        let header = MessageHeader {
            magic: DEFAULT_MAGIC,
            command: Command::Ping.to_bytes(),
            payload_length: payload.len() as u32,
            checksum: checksum_for(Command::Ping, &payload),
        };
        let mut bytes = header.serialize();
        bytes.extend_from_slice(&payload);

        let err = decode_message(&bytes).unwrap_err();
        assert!(matches!(err, WireError::ProtocolViolation(_)));
        assert!(!err.is_incomplete());

        // more bytes after the window change nothing
        bytes.extend_from_slice(&[0u8; 64]);
        let err = decode_message(&bytes).unwrap_err();
        assert!(matches!(err, WireError::ProtocolViolation(_)));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_oversized_window_is_a_violation() {
        // a ping whose window holds one extra byte, with a matching checksum
        let mut payload = 5u64.to_le_bytes().to_vec();
        payload.push(0);
        let header = MessageHeader {
            magic: DEFAULT_MAGIC,
            command: Command::Ping.to_bytes(),
            payload_length: payload.len() as u32,
            checksum: checksum_for(Command::Ping, &payload),
        };
        let mut bytes = header.serialize();
        bytes.extend_from_slice(&payload);

        assert!(matches!(
            decode_message(&bytes),
            Err(WireError::ProtocolViolation(_))
        ));
    }
}

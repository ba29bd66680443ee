//! Stream framing for `tokio_util::codec`
//!
//! Lets a transport wrap any byte stream in `Framed<_, MessageCodec>` and
//! exchange whole [`Message`]s. The codec holds no connection state
//! beyond the configuration.

use crate::config::WireConfig;
use crate::error::WireError;
use crate::network::header::MESSAGE_HEADER_SIZE;
use crate::network::message::{decode_message, Message};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Message codec for magic-prefixed, checksummed framing
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    config: WireConfig,
}

impl MessageCodec {
    pub fn new(config: WireConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WireConfig {
        &self.config
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item.serialize();
        let size = data.len() - MESSAGE_HEADER_SIZE;
        if size > self.config.max_payload_size {
            return Err(WireError::PayloadTooLarge {
                size,
                max: self.config.max_payload_size,
            });
        }

        dst.reserve(data.len());
        dst.extend_from_slice(&data);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least header
        if src.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }

        if src[..4] != self.config.magic {
            log::warn!("Rejecting frame with magic {}", hex::encode(&src[..4]));
            return Err(WireError::MagicMismatch {
                expected: hex::encode(self.config.magic),
                found: hex::encode(&src[..4]),
            });
        }

        let len = u32::from_le_bytes([src[16], src[17], src[18], src[19]]) as usize;
        if len > self.config.max_payload_size {
            return Err(WireError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }

        // Check if we have full message
        let frame_len = MESSAGE_HEADER_SIZE + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        let (message, _) = decode_message(&frame)?;
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::payload::Payload;

    #[test]
    fn test_partial_then_complete() {
        let mut codec = MessageCodec::default();
        let bytes = Message::ping(codec.config().magic, 77).serialize();

        let mut buf = BytesMut::from(&bytes[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[20..30]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[30..]);

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg, Message::ping(codec.config().magic, 77));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_pipelined_frames() {
        let mut codec = MessageCodec::default();
        let magic = codec.config().magic;
        let mut buf = BytesMut::new();
        codec.encode(Message::new(magic, Payload::Verack), &mut buf).unwrap();
        codec.encode(Message::ping(magic, 3), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().payload, Payload::Verack);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Message::ping(magic, 3));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_foreign_magic() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::from(&Message::ping([1, 2, 3, 4], 1).serialize()[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WireError::MagicMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_ceiling() {
        let config = WireConfig {
            max_payload_size: 4,
            ..WireConfig::default()
        };
        let mut codec = MessageCodec::new(config);
        let magic = codec.config().magic;

        // only the header is needed to reject the frame
        let bytes = Message::ping(magic, 1).serialize();
        let mut buf = BytesMut::from(&bytes[..MESSAGE_HEADER_SIZE]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WireError::PayloadTooLarge { size: 8, max: 4 })
        ));

        let mut out = BytesMut::new();
        assert!(codec.encode(Message::ping(magic, 1), &mut out).is_err());
        assert!(codec.encode(Message::new(magic, Payload::Verack), &mut out).is_ok());
    }
}

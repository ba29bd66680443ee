//! CompactSize-style variable-length integers
//!
//! ```text
//! value < 0xFD          -> 1 byte  (the value itself)
//! value <= 0xFFFF       -> 0xFD + u16 LE
//! value <= 0xFFFF_FFFF  -> 0xFE + u32 LE
//! otherwise             -> 0xFF + u64 LE
//! ```

use crate::error::{Result, WireError};
use bytes::BufMut;
use serde::Serialize;

const TAG_U16: u8 = 0xFD;
const TAG_U32: u8 = 0xFE;
const TAG_U64: u8 = 0xFF;

/// A non-negative integer with a magnitude-selected wire width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct VarInt(pub u64);

impl VarInt {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Wrap a collection length
    pub fn from_len(len: usize) -> Self {
        Self(len as u64)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Number of bytes the encoded form occupies: 1, 3, 5 or 9
    pub fn encoded_len(self) -> usize {
        match self.0 {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    pub fn encode_into<B: BufMut>(self, buf: &mut B) {
        match self.0 {
            0..=0xFC => buf.put_u8(self.0 as u8),
            0xFD..=0xFFFF => {
                buf.put_u8(TAG_U16);
                buf.put_u16_le(self.0 as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                buf.put_u8(TAG_U32);
                buf.put_u32_le(self.0 as u32);
            }
            _ => {
                buf.put_u8(TAG_U64);
                buf.put_u64_le(self.0);
            }
        }
    }

    pub fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Decode a varint from the front of `data`, returning the rest.
    ///
    /// Non-minimal encodings (e.g. `FD 01 00`) are rejected so that every
    /// accepted input re-encodes to the same bytes.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| WireError::MalformedVarInt("empty input".to_string()))?;

        let (width, min) = match tag {
            TAG_U16 => (2, 0xFD),
            TAG_U32 => (4, 0x1_0000),
            TAG_U64 => (8, 0x1_0000_0000),
            _ => return Ok((Self(tag as u64), rest)),
        };

        if rest.len() < width {
            return Err(WireError::MalformedVarInt(format!(
                "tag {:#04x} needs {} bytes, {} available",
                tag,
                width,
                rest.len()
            )));
        }

        let (raw, rest) = rest.split_at(width);
        let mut le = [0u8; 8];
        le[..width].copy_from_slice(raw);
        let value = u64::from_le_bytes(le);

        if value < min {
            return Err(WireError::MalformedVarInt(format!(
                "non-canonical encoding of {} with tag {:#04x}",
                value, tag
            )));
        }

        Ok((Self(value), rest))
    }

    /// Decode a varint that counts elements or bytes
    pub fn decode_len(data: &[u8]) -> Result<(usize, &[u8])> {
        let (count, rest) = Self::decode(data)?;
        let len = usize::try_from(count.0).map_err(|_| {
            WireError::MalformedVarInt(format!("length {} does not fit in memory", count.0))
        })?;
        Ok((len, rest))
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<VarInt> for u64 {
    fn from(value: VarInt) -> Self {
        value.0
    }
}

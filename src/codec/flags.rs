//! Bit-reversed flag bitmap used by `merkleblock` payloads
//!
//! The logical value is LSB-first: bit 0 marks the first Merkle node.
//! On the wire the bits are mirrored across the whole occupied width
//! (`byte_length * 8` bits) and written big-endian, so bit 0 of the value
//! becomes the most significant bit of the first serialized byte. Per byte
//! that is simply a bit reversal, which is how it is computed here.
//!
//! A bitmap is never zero and has no upper size: a partial tree over any
//! number of nodes fits. An all-clear bitmap has no byte length and so has
//! no wire form; constructing one fails with `InvalidFlags`.

use crate::error::{Result, WireError};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagBitmap {
    /// Logical value, least significant byte first; the last byte is never zero
    bytes: Vec<u8>,
}

impl FlagBitmap {
    /// Bitmap from its little-endian logical bytes; trailing zero bytes are dropped
    pub fn from_le_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        if bytes.is_empty() {
            return Err(WireError::InvalidFlags(
                "flag bitmap must be non-zero".to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn from_value(value: u64) -> Result<Self> {
        Self::from_le_bytes(value.to_le_bytes().to_vec())
    }

    /// Bitmap with flag `i` set when `flags[i]` is true
    pub fn from_flags(flags: &[bool]) -> Result<Self> {
        let mut bytes = vec![0u8; (flags.len() + 7) / 8];
        for (i, _) in flags.iter().enumerate().filter(|(_, set)| **set) {
            bytes[i / 8] |= 1 << (i % 8);
        }
        Self::from_le_bytes(bytes)
    }

    /// Bitmap with the first `count` flags set
    pub fn with_leading(count: usize) -> Result<Self> {
        let mut bytes = vec![0xFF; count / 8];
        if count % 8 != 0 {
            bytes.push((1u8 << (count % 8)) - 1);
        }
        Self::from_le_bytes(bytes)
    }

    /// The logical value, if it fits in 64 bits
    pub fn to_u64(&self) -> Option<u64> {
        if self.bytes.len() > 8 {
            return None;
        }
        let mut le = [0u8; 8];
        le[..self.bytes.len()].copy_from_slice(&self.bytes);
        Some(u64::from_le_bytes(le))
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map_or(false, |byte| byte >> (index % 8) & 1 == 1)
    }

    /// Number of set bits
    pub fn bit_count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Index of the highest set bit plus one
    pub fn bit_len(&self) -> usize {
        let top = self.bytes.last().copied().unwrap_or(0);
        (self.bytes.len() - 1) * 8 + (8 - top.leading_zeros() as usize)
    }

    /// Minimum number of bytes holding the highest set bit
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// Flags in node order, up to the highest set bit
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len()).map(move |i| self.is_set(i))
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.reverse_bits()).collect()
    }

    /// Read `byte_count` bytes from the front of `data`.
    ///
    /// The last byte must carry a flag: padded forms would not serialize
    /// back to the same bytes.
    pub fn deserialize(data: &[u8], byte_count: usize) -> Result<(Self, &[u8])> {
        if byte_count == 0 {
            return Err(WireError::InvalidFlags(
                "flag byte count must be positive".to_string(),
            ));
        }
        if data.len() < byte_count {
            return Err(WireError::truncated(byte_count, data.len()));
        }

        let (raw, rest) = data.split_at(byte_count);
        if raw.last() == Some(&0) && raw.iter().any(|b| *b != 0) {
            return Err(WireError::InvalidFlags(format!(
                "{} flag bytes end in a zero byte",
                byte_count
            )));
        }

        let flags = Self::from_le_bytes(raw.iter().map(|b| b.reverse_bits()).collect())?;
        Ok((flags, rest))
    }
}

/// Renders as the flags in node order, e.g. `"1101"`
impl Serialize for FlagBitmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let bits: String = self.iter().map(|set| if set { '1' } else { '0' }).collect();
        serializer.serialize_str(&bits)
    }
}

impl TryFrom<u64> for FlagBitmap {
    type Error = WireError;

    fn try_from(value: u64) -> Result<Self> {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_rejected() {
        assert!(matches!(FlagBitmap::from_value(0), Err(WireError::InvalidFlags(_))));
        assert!(matches!(FlagBitmap::with_leading(0), Err(WireError::InvalidFlags(_))));
        assert!(matches!(
            FlagBitmap::from_flags(&[false; 20]),
            Err(WireError::InvalidFlags(_))
        ));
    }

    #[test]
    fn test_bit_zero_becomes_msb() {
        let flags = FlagBitmap::from_value(1).unwrap();
        assert_eq!(flags.serialize(), vec![0x80]);

        let flags = FlagBitmap::from_value(0b1011).unwrap();
        assert_eq!(flags.serialize(), vec![0b1101_0000]);

        // 0x0100 occupies two bytes; bit 8 mirrors to bit 7
        let flags = FlagBitmap::from_value(0x0100).unwrap();
        assert_eq!(flags.byte_length(), 2);
        assert_eq!(flags.serialize(), vec![0x00, 0x80]);
    }

    #[test]
    fn test_counts() {
        let flags = FlagBitmap::from_value(0b1_0101_0101).unwrap();
        assert_eq!(flags.bit_count(), 5);
        assert_eq!(flags.bit_len(), 9);
        assert_eq!(flags.byte_length(), 2);
        assert_eq!(FlagBitmap::from_value(u64::MAX).unwrap().byte_length(), 8);
        assert_eq!(FlagBitmap::with_leading(7).unwrap().to_u64(), Some(0x7F));
        assert!(FlagBitmap::with_leading(7).unwrap().is_set(6));
        assert!(!FlagBitmap::with_leading(7).unwrap().is_set(7));
        assert_eq!(serde_json::to_string(&FlagBitmap::from_value(0b1011).unwrap()).unwrap(), "\"1101\"");
    }

    #[test]
    fn test_wider_than_64_bits() {
        let flags = FlagBitmap::with_leading(70).unwrap();
        assert_eq!(flags.byte_length(), 9);
        assert_eq!(flags.bit_count(), 70);
        assert_eq!(flags.to_u64(), None);

        let bytes = flags.serialize();
        assert_eq!(&bytes[..8], &[0xFF; 8]);
        // flags 64..70 fill the top six bits of the last byte
        assert_eq!(bytes[8], 0b1111_1100);

        let (decoded, rest) = FlagBitmap::deserialize(&[0x80; 9], 9).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded.bit_count(), 9);
        assert!(decoded.is_set(0) && decoded.is_set(8) && decoded.is_set(64));
        assert!(!decoded.is_set(1));
    }

    #[test]
    fn test_deserialize_returns_remainder() {
        let (flags, rest) = FlagBitmap::deserialize(&[0x80, 0xAA], 1).unwrap();
        assert_eq!(flags.to_u64(), Some(1));
        assert_eq!(rest, &[0xAA]);

        assert!(matches!(
            FlagBitmap::deserialize(&[0x00], 1),
            Err(WireError::InvalidFlags(_))
        ));
        assert!(matches!(
            FlagBitmap::deserialize(&[0x80, 0x00], 2),
            Err(WireError::InvalidFlags(_))
        ));
        assert!(matches!(
            FlagBitmap::deserialize(&[0x80], 2),
            Err(WireError::TruncatedInput { .. })
        ));
        assert!(matches!(
            FlagBitmap::deserialize(&[0x80], 0),
            Err(WireError::InvalidFlags(_))
        ));
    }

    #[test]
    fn test_mirrors_within_occupied_width() {
        let mut rng = StdRng::seed_from_u64(0xF1A6);
        for _ in 0..500 {
            let value = rng.gen::<u64>() >> rng.gen_range(0..64u32);
            let Ok(flags) = FlagBitmap::from_value(value) else {
                continue;
            };
            let width = flags.byte_length();
            let mirrored = value.reverse_bits() >> (64 - 8 * width);
            assert_eq!(flags.serialize(), mirrored.to_be_bytes()[8 - width..].to_vec());
        }
    }

    #[test]
    fn test_inverse_over_every_width() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for bit_len in 1..=200usize {
            for _ in 0..8 {
                // highest flag fixed at `bit_len - 1`, lower flags random
                let mut node_flags: Vec<bool> = (0..bit_len).map(|_| rng.gen()).collect();
                node_flags[bit_len - 1] = true;

                let flags = FlagBitmap::from_flags(&node_flags).unwrap();
                assert_eq!(flags.bit_len(), bit_len);
                assert_eq!(flags.byte_length(), (bit_len + 7) / 8);
                assert_eq!(flags.iter().collect::<Vec<_>>(), node_flags);

                let bytes = flags.serialize();
                let (decoded, rest) = FlagBitmap::deserialize(&bytes, bytes.len()).unwrap();
                assert!(rest.is_empty());
                assert_eq!(decoded, flags, "{} flags", bit_len);
            }
        }
    }
}

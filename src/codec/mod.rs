//! Wire codec primitives
//!
//! This module contains:
//! - `VarInt`: compactSize length/count prefix
//! - `Layout`: fixed-width struct packing built from field descriptors
//! - `FlagBitmap`: the bit-reversed node marker set of `merkleblock`
//! - `Encodable`: the serialize/deserialize/hash contract every entity
//!   and payload implements, plus helpers for length-prefixed data

pub mod flags;
pub mod layout;
pub mod varint;

pub use flags::FlagBitmap;
pub use layout::{ByteOrder, Field, IntWidth, Layout, Unpacked, Value};
pub use varint::VarInt;

use crate::crypto::{sha256, Hash256};
use crate::error::{Result, WireError};
use bytes::BufMut;

/// Binary wire form shared by entities and payloads.
///
/// `decode` consumes exactly one value from the front of `data` and hands
/// back whatever follows it.
pub trait Encodable: Sized {
    fn encode_into(&self, buf: &mut Vec<u8>);

    fn decode(data: &[u8]) -> Result<(Self, &[u8])>;

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encoded_len(&self) -> usize {
        self.serialize().len()
    }

    /// Single SHA-256 over the serialized form
    fn content_hash(&self) -> Hash256 {
        sha256(&self.serialize())
    }
}

impl Encodable for Hash256 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.as_bytes());
    }

    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (raw, rest) = take_array::<32>(data)?;
        Ok((Hash256(raw), rest))
    }

    fn encoded_len(&self) -> usize {
        32
    }
}

/// Split `n` bytes off the front of `data`
pub fn take_bytes(data: &[u8], n: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < n {
        return Err(WireError::truncated(n, data.len()));
    }
    Ok(data.split_at(n))
}

pub fn take_array<const N: usize>(data: &[u8]) -> Result<([u8; N], &[u8])> {
    let (head, rest) = take_bytes(data, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

pub fn take_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (raw, rest) = take_array::<4>(data)?;
    Ok((u32::from_le_bytes(raw), rest))
}

pub fn take_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (raw, rest) = take_array::<8>(data)?;
    Ok((u64::from_le_bytes(raw), rest))
}

/// VarInt length followed by that many bytes
pub fn put_var_bytes<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    VarInt::from_len(bytes.len()).encode_into(buf);
    buf.put_slice(bytes);
}

/// Read a VarInt-prefixed byte string no longer than `max`
pub fn take_var_bytes(data: &[u8], max: usize) -> Result<(Vec<u8>, &[u8])> {
    let (len, rest) = VarInt::decode_len(data)?;
    if len > max {
        return Err(WireError::OversizedScript { size: len, max });
    }
    let (bytes, rest) = take_bytes(rest, len)?;
    Ok((bytes.to_vec(), rest))
}

/// VarInt count followed by each item
pub fn put_list<T: Encodable>(buf: &mut Vec<u8>, items: &[T]) {
    VarInt::from_len(items.len()).encode_into(buf);
    for item in items {
        item.encode_into(buf);
    }
}

/// Read a VarInt count followed by that many items
pub fn take_list<T: Encodable>(data: &[u8]) -> Result<(Vec<T>, &[u8])> {
    let (count, mut rest) = VarInt::decode_len(data)?;
    // every item is at least one byte, so a count beyond the input is truncation
    if count > rest.len() {
        return Err(WireError::truncated(count, rest.len()));
    }
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let (item, tail) = T::decode(rest)?;
        items.push(item);
        rest = tail;
    }
    Ok((items, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_bytes() {
        let mut buf = Vec::new();
        put_var_bytes(&mut buf, b"audit");
        assert_eq!(buf[0], 5);

        let (bytes, rest) = take_var_bytes(&buf, 100).unwrap();
        assert_eq!(bytes, b"audit");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_var_bytes_limits() {
        let mut buf = Vec::new();
        put_var_bytes(&mut buf, &[7u8; 101]);
        assert!(matches!(
            take_var_bytes(&buf, 100),
            Err(WireError::OversizedScript { size: 101, max: 100 })
        ));
        assert!(matches!(
            take_var_bytes(&buf[..50], 200),
            Err(WireError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_take_fixed() {
        let data = [1u8, 0, 0, 0, 9];
        let (v, rest) = take_u32(&data).unwrap();
        assert_eq!(v, 1);
        assert_eq!(rest, &[9]);
        assert!(take_u64(&data).unwrap_err().is_incomplete());
    }
}

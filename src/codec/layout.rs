//! Fixed-layout struct packing
//!
//! A [`Layout`] is an ordered list of fixed-width [`Field`]s. Layouts are
//! built once (either from a static field table or by parsing a
//! struct-format descriptor such as `"<I32s32sI"`), concatenated with `+`,
//! and then used to pack and unpack [`Value`]s. The total byte length of a
//! layout is known without any data.

use crate::error::{Result, WireError};
use bytes::BufMut;
use std::borrow::Cow;
use std::ops::Add;

/// Byte order of an integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Width of an integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W1,
    W2,
    W4,
    W8,
}

impl IntWidth {
    pub const fn bytes(self) -> usize {
        match self {
            IntWidth::W1 => 1,
            IntWidth::W2 => 2,
            IntWidth::W4 => 4,
            IntWidth::W8 => 8,
        }
    }

    const fn bits(self) -> u32 {
        8 * self.bytes() as u32
    }
}

impl TryFrom<usize> for IntWidth {
    type Error = WireError;

    fn try_from(bytes: usize) -> Result<Self> {
        match bytes {
            1 => Ok(IntWidth::W1),
            2 => Ok(IntWidth::W2),
            4 => Ok(IntWidth::W4),
            8 => Ok(IntWidth::W8),
            other => Err(WireError::InvalidLayoutSpec(format!(
                "integer width {} is not 1, 2, 4 or 8 bytes",
                other
            ))),
        }
    }
}

/// A single fixed-width field descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Padding bytes: written as zeros, skipped when reading
    Pad(usize),
    Int {
        width: IntWidth,
        signed: bool,
        order: ByteOrder,
    },
    /// Raw byte array of exactly this length
    Bytes(usize),
}

impl Field {
    pub const U8: Field = Field::uint(IntWidth::W1);
    pub const U16: Field = Field::uint(IntWidth::W2);
    pub const U32: Field = Field::uint(IntWidth::W4);
    pub const U64: Field = Field::uint(IntWidth::W8);
    pub const I32: Field = Field::int(IntWidth::W4);
    pub const I64: Field = Field::int(IntWidth::W8);
    /// Network-order u16 (ports)
    pub const U16_BE: Field = Field::Int {
        width: IntWidth::W2,
        signed: false,
        order: ByteOrder::Big,
    };
    pub const HASH: Field = Field::Bytes(32);

    const fn uint(width: IntWidth) -> Self {
        Field::Int {
            width,
            signed: false,
            order: ByteOrder::Little,
        }
    }

    const fn int(width: IntWidth) -> Self {
        Field::Int {
            width,
            signed: true,
            order: ByteOrder::Little,
        }
    }

    /// Encoded width of this field in bytes
    pub const fn len(&self) -> usize {
        match *self {
            Field::Pad(n) | Field::Bytes(n) => n,
            Field::Int { width, .. } => width.bytes(),
        }
    }

    /// Whether this field consumes a value when packing
    pub const fn takes_value(&self) -> bool {
        !matches!(self, Field::Pad(_))
    }
}

/// A packed or unpacked field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Bytes(Vec<u8>),
}

macro_rules! value_from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::UInt(v as u64)
            }
        })*
    };
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_uint!(u8, u16, u32, u64);
value_from_int!(i8, i16, i32, i64);

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(v: [u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(v: &[u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

/// Ordered, fixed-length binary layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Cow<'static, [Field]>,
}

impl Layout {
    /// Layout over a static field table (usable in `const` items)
    pub const fn from_static(fields: &'static [Field]) -> Self {
        Self {
            fields: Cow::Borrowed(fields),
        }
    }

    /// Layout over a runtime field list. An empty list is rejected.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(WireError::InvalidLayoutSpec(
                "layout has no fields".to_string(),
            ));
        }
        Ok(Self {
            fields: Cow::Owned(fields),
        })
    }

    /// Parse a struct-format descriptor.
    ///
    /// Grammar: an optional byte-order prefix (`<` or `=` little endian,
    /// `>` or `!` big endian), then one or more `[count]code` items.
    /// Supported codes: `x` pad, `c` byte, `?` bool, `b`/`B` 8-bit,
    /// `h`/`H` 16-bit, `i`/`I`/`l`/`L` 32-bit, `q`/`Q` 64-bit and `s`
    /// byte array (`32s` = 32 bytes). Anything else fails with
    /// `InvalidLayoutSpec` here rather than when the layout is used.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |why: String| WireError::InvalidLayoutSpec(format!("{:?}: {}", spec, why));

        let mut chars = spec.chars().peekable();
        let order = match chars.peek() {
            Some('<') | Some('=') => {
                chars.next();
                ByteOrder::Little
            }
            Some('>') | Some('!') => {
                chars.next();
                ByteOrder::Big
            }
            _ => ByteOrder::Little,
        };

        let mut fields = Vec::new();
        let mut count: Option<usize> = None;

        for c in chars {
            if c.is_whitespace() && count.is_none() {
                continue;
            }
            if let Some(digit) = c.to_digit(10) {
                let next = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit as usize))
                    .ok_or_else(|| invalid("repeat count overflows".to_string()))?;
                count = Some(next);
                continue;
            }

            let n = count.take().unwrap_or(1);
            let int = |width: IntWidth, signed: bool| Field::Int {
                width,
                signed,
                order,
            };
            match c {
                'x' => fields.push(Field::Pad(n)),
                's' => fields.push(Field::Bytes(n)),
                'c' => fields.extend(std::iter::repeat(Field::Bytes(1)).take(n)),
                '?' | 'B' => fields.extend(std::iter::repeat(int(IntWidth::W1, false)).take(n)),
                'b' => fields.extend(std::iter::repeat(int(IntWidth::W1, true)).take(n)),
                'H' => fields.extend(std::iter::repeat(int(IntWidth::W2, false)).take(n)),
                'h' => fields.extend(std::iter::repeat(int(IntWidth::W2, true)).take(n)),
                'I' | 'L' => fields.extend(std::iter::repeat(int(IntWidth::W4, false)).take(n)),
                'i' | 'l' => fields.extend(std::iter::repeat(int(IntWidth::W4, true)).take(n)),
                'Q' => fields.extend(std::iter::repeat(int(IntWidth::W8, false)).take(n)),
                'q' => fields.extend(std::iter::repeat(int(IntWidth::W8, true)).take(n)),
                other => return Err(invalid(format!("unsupported format code {:?}", other))),
            }
        }

        if count.is_some() {
            return Err(invalid("repeat count without a format code".to_string()));
        }
        if fields.is_empty() {
            return Err(invalid("layout has no fields".to_string()));
        }

        Self::new(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total encoded length in bytes
    pub fn len(&self) -> usize {
        self.fields.iter().map(Field::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of values `serialize` expects
    pub fn value_count(&self) -> usize {
        self.fields.iter().filter(|f| f.takes_value()).count()
    }

    /// This layout followed by `other`
    pub fn concat(&self, other: &Layout) -> Layout {
        let mut fields = self.fields.to_vec();
        fields.extend_from_slice(&other.fields);
        Layout {
            fields: Cow::Owned(fields),
        }
    }

    /// Pack `values` (one per non-pad field, in order)
    pub fn serialize(&self, values: &[Value]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len());
        self.serialize_into(values, &mut out)?;
        Ok(out)
    }

    /// Pack `values` onto `buf`. Nothing is written if any value is rejected.
    pub fn serialize_into<B: BufMut>(&self, values: &[Value], buf: &mut B) -> Result<()> {
        if values.len() != self.value_count() {
            return Err(WireError::InvalidLayoutValue(format!(
                "layout takes {} values, got {}",
                self.value_count(),
                values.len()
            )));
        }

        let mut staged = Vec::with_capacity(self.len());
        let mut values = values.iter();

        for field in self.fields.iter() {
            match *field {
                Field::Pad(n) => staged.resize(staged.len() + n, 0),
                Field::Bytes(n) => match values.next() {
                    Some(Value::Bytes(b)) if b.len() == n => staged.extend_from_slice(b),
                    Some(Value::Bytes(b)) => {
                        return Err(WireError::InvalidLayoutValue(format!(
                            "{}-byte field given {} bytes",
                            n,
                            b.len()
                        )))
                    }
                    other => return Err(mismatch(field, other)),
                },
                Field::Int {
                    width,
                    signed,
                    order,
                } => {
                    let value = values.next();
                    let raw = match value {
                        Some(&Value::UInt(v)) => int_bits(v as i128, width, signed),
                        Some(&Value::Int(v)) => int_bits(v as i128, width, signed),
                        other => return Err(mismatch(field, other)),
                    }
                    .ok_or_else(|| {
                        WireError::InvalidLayoutValue(format!(
                            "{:?} out of range for {}-byte {} field",
                            value,
                            width.bytes(),
                            if signed { "signed" } else { "unsigned" }
                        ))
                    })?;
                    let w = width.bytes();
                    match order {
                        ByteOrder::Little => staged.extend_from_slice(&raw.to_le_bytes()[..w]),
                        ByteOrder::Big => staged.extend_from_slice(&raw.to_be_bytes()[8 - w..]),
                    }
                }
            }
        }

        buf.put_slice(&staged);
        Ok(())
    }

    /// Unpack exactly `self.len()` bytes from the front of `data`
    pub fn deserialize<'a>(&self, data: &'a [u8]) -> Result<(Unpacked, &'a [u8])> {
        let len = self.len();
        if data.len() < len {
            return Err(WireError::truncated(len, data.len()));
        }

        let (mut head, rest) = data.split_at(len);
        let mut values = Vec::with_capacity(self.value_count());

        for field in self.fields.iter() {
            let (chunk, tail) = head.split_at(field.len());
            head = tail;
            match *field {
                Field::Pad(_) => {}
                Field::Bytes(_) => values.push(Value::Bytes(chunk.to_vec())),
                Field::Int {
                    width,
                    signed,
                    order,
                } => {
                    let w = width.bytes();
                    let mut raw = [0u8; 8];
                    let bits = match order {
                        ByteOrder::Little => {
                            raw[..w].copy_from_slice(chunk);
                            u64::from_le_bytes(raw)
                        }
                        ByteOrder::Big => {
                            raw[8 - w..].copy_from_slice(chunk);
                            u64::from_be_bytes(raw)
                        }
                    };
                    if signed {
                        let shift = 64 - width.bits();
                        values.push(Value::Int(((bits << shift) as i64) >> shift));
                    } else {
                        values.push(Value::UInt(bits));
                    }
                }
            }
        }

        Ok((
            Unpacked {
                values: values.into_iter(),
            },
            rest,
        ))
    }
}

/// Two's complement bits of `v` if it fits the field
fn int_bits(v: i128, width: IntWidth, signed: bool) -> Option<u64> {
    let bits = width.bits();
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    (min..=max).contains(&v).then_some(v as i64 as u64)
}

fn mismatch(field: &Field, value: Option<&Value>) -> WireError {
    WireError::InvalidLayoutValue(format!("{:?} cannot hold {:?}", field, value))
}

impl Add for Layout {
    type Output = Layout;

    fn add(self, rhs: Layout) -> Layout {
        self.concat(&rhs)
    }
}

impl Add<&Layout> for &Layout {
    type Output = Layout;

    fn add(self, rhs: &Layout) -> Layout {
        self.concat(rhs)
    }
}

/// Values produced by [`Layout::deserialize`], consumed front to back
#[derive(Debug)]
pub struct Unpacked {
    values: std::vec::IntoIter<Value>,
}

impl Unpacked {
    pub fn next_value(&mut self) -> Result<Value> {
        self.values
            .next()
            .ok_or_else(|| WireError::InvalidLayoutValue("no more unpacked values".to_string()))
    }

    pub fn uint(&mut self) -> Result<u64> {
        match self.next_value()? {
            Value::UInt(v) => Ok(v),
            other => Err(WireError::InvalidLayoutValue(format!(
                "expected unsigned value, found {:?}",
                other
            ))),
        }
    }

    pub fn int(&mut self) -> Result<i64> {
        match self.next_value()? {
            Value::Int(v) => Ok(v),
            other => Err(WireError::InvalidLayoutValue(format!(
                "expected signed value, found {:?}",
                other
            ))),
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        narrow(self.uint()?)
    }

    pub fn u16(&mut self) -> Result<u16> {
        narrow(self.uint()?)
    }

    pub fn u32(&mut self) -> Result<u32> {
        narrow(self.uint()?)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.uint()
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        match self.next_value()? {
            Value::Bytes(b) => Ok(b),
            other => Err(WireError::InvalidLayoutValue(format!(
                "expected bytes, found {:?}",
                other
            ))),
        }
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.bytes()?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            WireError::InvalidLayoutValue(format!("expected {} bytes, found {}", N, len))
        })
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.collect()
    }
}

fn narrow<T: TryFrom<u64>>(v: u64) -> Result<T> {
    T::try_from(v).map_err(|_| {
        WireError::InvalidLayoutValue(format!(
            "{} does not fit in {}",
            v,
            std::any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPOINT: Layout = Layout::from_static(&[Field::HASH, Field::U32]);

    #[test]
    fn test_static_layout_len() {
        assert_eq!(OUTPOINT.len(), 36);
        assert_eq!(
            Layout::parse("<32sI").unwrap(),
            Layout::new(vec![Field::HASH, Field::U32]).unwrap()
        );
    }

    #[test]
    fn test_parse_descriptors() {
        let header = Layout::parse("<I32s32sI").unwrap();
        assert_eq!(header.len(), 72);
        assert_eq!(Layout::parse("4s12sI4s").unwrap().len(), 24);
        assert_eq!(Layout::parse("!H").unwrap().fields(), &[Field::U16_BE]);
        assert_eq!(Layout::parse("<2xQ").unwrap().len(), 10);
    }

    #[test]
    fn test_parse_rejects_bad_descriptors() {
        for spec in ["", "<", "<Z", "<I4", "<f", "<P", "<99999999999999999999999s"] {
            assert!(
                matches!(Layout::parse(spec), Err(WireError::InvalidLayoutSpec(_))),
                "{:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_runtime_layouts_checked_at_construction() {
        assert!(matches!(Layout::new(vec![]), Err(WireError::InvalidLayoutSpec(_))));
        for width in [0usize, 3, 9] {
            assert!(matches!(
                IntWidth::try_from(width),
                Err(WireError::InvalidLayoutSpec(_))
            ));
        }

        let field = Field::Int {
            width: IntWidth::try_from(8usize).unwrap(),
            signed: true,
            order: ByteOrder::Big,
        };
        let layout = Layout::new(vec![field, Field::Bytes(0)]).unwrap();
        assert_eq!(layout.len(), 8);
        let bytes = layout.serialize(&[Value::from(-2i64), Value::Bytes(Vec::new())]).unwrap();
        assert_eq!(bytes, (-2i64).to_be_bytes());
        let (mut unpacked, _) = layout.deserialize(&bytes).unwrap();
        assert_eq!(unpacked.int().unwrap(), -2);
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = Layout::parse("<I").unwrap();
        let b = Layout::parse("<Q").unwrap();
        let c = Layout::parse("<H").unwrap();

        let left = (&a + &b) + c.clone();
        let right = a.clone() + (&b + &c);
        assert_eq!(left, right);
        assert_eq!(left.fields(), &[Field::U32, Field::U64, Field::U16]);
    }

    #[test]
    fn test_pack_unpack() {
        let layout = Layout::parse("<I32sqH").unwrap() + Layout::from_static(&[Field::U16_BE]);
        let values = vec![
            Value::from(7u32),
            Value::from([0xAB; 32]),
            Value::from(-5i64),
            Value::from(513u16),
            Value::from(8333u16),
        ];
        let mut bytes = layout.serialize(&values).unwrap();
        assert_eq!(bytes.len(), layout.len());
        assert_eq!(&bytes[bytes.len() - 2..], &8333u16.to_be_bytes());

        bytes.extend_from_slice(b"tail");
        let (mut unpacked, rest) = layout.deserialize(&bytes).unwrap();
        assert_eq!(rest, b"tail");
        assert_eq!(unpacked.u32().unwrap(), 7);
        assert_eq!(unpacked.array::<32>().unwrap(), [0xAB; 32]);
        assert_eq!(unpacked.int().unwrap(), -5);
        assert_eq!(unpacked.u16().unwrap(), 513);
        assert_eq!(unpacked.u16().unwrap(), 8333);
    }

    #[test]
    fn test_truncated_input() {
        let err = OUTPOINT.deserialize(&[0u8; 35]).unwrap_err();
        assert!(matches!(
            err,
            WireError::TruncatedInput {
                needed: 36,
                available: 35
            }
        ));
    }

    #[test]
    fn test_value_out_of_range() {
        let layout = Layout::parse("<B").unwrap();
        assert!(matches!(
            layout.serialize(&[Value::from(256u32)]),
            Err(WireError::InvalidLayoutValue(_))
        ));
        assert!(matches!(
            OUTPOINT.serialize(&[Value::from([0u8; 31]), Value::from(0u32)]),
            Err(WireError::InvalidLayoutValue(_))
        ));
        assert!(matches!(
            OUTPOINT.serialize(&[Value::from([0u8; 32])]),
            Err(WireError::InvalidLayoutValue(_))
        ));
    }

    #[test]
    fn test_padding_skipped() {
        let layout = Layout::parse("<B3xB").unwrap();
        let bytes = layout
            .serialize(&[Value::from(1u8), Value::from(2u8)])
            .unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 2]);
        let (unpacked, _) = layout.deserialize(&bytes).unwrap();
        assert_eq!(unpacked.into_values(), vec![Value::UInt(1), Value::UInt(2)]);
    }
}

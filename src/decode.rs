//! Schema-driven decoding of fixed-layout structures into named integers.

use std::fmt;

use ext3_types::{ByteOrder, Field, Schema};
use itertools::Itertools;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{Error, Result};

/// How a decoded value is rendered. The integer itself is always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    #[default]
    Dec,
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldValue {
    pub value: u64,
    pub radix: Radix,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.radix {
            Radix::Dec => write!(f, "{}", self.value),
            Radix::Hex => write!(f, "{:#x}", self.value),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.radix {
            Radix::Dec => serializer.serialize_u64(self.value),
            Radix::Hex => serializer.collect_str(self),
        }
    }
}

/// Field name to value mapping, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedRecord {
    fields: Vec<(&'static str, FieldValue)>,
}

impl DecodedRecord {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.value(name).map(|v| v.value)
    }

    pub fn value(&self, name: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// Like [`DecodedRecord::get`], for fields the caller relies on.
    pub fn require(&self, name: &str) -> Result<u64> {
        self.get(name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))
    }

    /// The same values, rendered with `radix`.
    pub fn with_radix(mut self, radix: Radix) -> Self {
        for (_, value) in &mut self.fields {
            value.radix = radix;
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldValue)> + '_ {
        self.fields.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for DecodedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Decode every field of `schema` from `bytes`, which must start at the
/// beginning of the structure.
pub fn decode(schema: Schema, bytes: &[u8], radix: Radix) -> Result<DecodedRecord> {
    let fields = schema
        .iter()
        .map(|field| {
            let value = read_uint(field_bytes(field, bytes)?, field.order);
            Ok((field.name, FieldValue { value, radix }))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DecodedRecord { fields })
}

/// The slice of `bytes` covered by `field`.
pub fn field_bytes<'a>(field: &Field, bytes: &'a [u8]) -> Result<&'a [u8]> {
    bytes.get(field.offset..field.end()).ok_or(Error::Bounds {
        field: field.name,
        end: field.end(),
        len: bytes.len(),
    })
}

/// Interpret up to eight bytes as an unsigned integer.
pub fn read_uint(bytes: &[u8], order: ByteOrder) -> u64 {
    let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
    match order {
        ByteOrder::Little => bytes.iter().rev().fold(0, fold),
        ByteOrder::Big => bytes.iter().fold(0, fold),
    }
}

/// Encode `value` into exactly `width` bytes, or `None` if it does not fit.
pub fn encode_uint(value: u64, width: usize, order: ByteOrder) -> Option<Vec<u8>> {
    if width == 0 || width > 8 || (width < 8 && value >> (8 * width) != 0) {
        return None;
    }

    let mut bytes = value.to_le_bytes()[..width].to_vec();
    if order == ByteOrder::Big {
        bytes.reverse();
    }
    Some(bytes)
}

/// Lowercase hex rendering of a byte string.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ext3_types::{GROUP_DESCRIPTOR, XATTR_ENTRY};

    #[test]
    fn byte_orders() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_uint(&bytes, ByteOrder::Little), 0x7856_3412);
        assert_eq!(read_uint(&bytes, ByteOrder::Big), 0x1234_5678);
        assert_eq!(read_uint(&[], ByteOrder::Little), 0);
    }

    #[test]
    fn encode_boundaries_round_trip() {
        for width in 1..=8 {
            let max = if width == 8 {
                u64::MAX
            } else {
                (1u64 << (8 * width)) - 1
            };
            for order in [ByteOrder::Little, ByteOrder::Big] {
                for value in [0, max] {
                    let bytes = encode_uint(value, width, order).unwrap();
                    assert_eq!(bytes.len(), width);
                    assert_eq!(read_uint(&bytes, order), value);
                }
            }
        }
    }

    #[test]
    fn encode_rejects_overflow() {
        assert_eq!(encode_uint(0x100, 1, ByteOrder::Little), None);
        assert_eq!(encode_uint(0x1_0000, 2, ByteOrder::Big), None);
        assert_eq!(encode_uint(1, 0, ByteOrder::Little), None);
        assert_eq!(
            encode_uint(0x0102, 2, ByteOrder::Big),
            Some(vec![0x01, 0x02])
        );
    }

    #[test]
    fn hex_strings() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
    }

    #[test]
    fn decodes_group_descriptor() {
        let mut bytes = [0u8; 32];
        bytes[8..12].copy_from_slice(&42u32.to_le_bytes());
        bytes[0x1E..0x20].copy_from_slice(&0xBEEFu16.to_le_bytes());

        let record = decode(GROUP_DESCRIPTOR, &bytes, Radix::Dec).unwrap();
        assert_eq!(record.len(), GROUP_DESCRIPTOR.len());
        assert_eq!(record.get("bg_inode_table_lo"), Some(42));
        assert_eq!(record.get("bg_checksum"), Some(0xBEEF));
        assert_eq!(record.get("bg_missing"), None);
    }

    #[test]
    fn short_buffer_is_bounds_error() {
        let err = decode(XATTR_ENTRY, &[0u8; 10], Radix::Hex).unwrap_err();
        assert!(matches!(
            err,
            Error::Bounds {
                field: "e_value_size",
                end: 12,
                len: 10
            }
        ));
    }

    #[test]
    fn hex_rendering_keeps_value() {
        let mut bytes = [0u8; 16];
        bytes[0] = 7;
        let record = decode(XATTR_ENTRY, &bytes, Radix::Hex).unwrap();

        let name_len = record.value("e_name_len").unwrap();
        assert_eq!(name_len.value, 7);
        assert_eq!(name_len.to_string(), "0x7");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["e_name_len"], "0x7");
        assert_eq!(json["e_hash"], "0x0");
    }

    #[test]
    fn json_keeps_schema_order() {
        let record = decode(GROUP_DESCRIPTOR, &[0u8; 32], Radix::Dec).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with("{\"bg_block_bitmap_lo\":0,"));
        assert!(json.ends_with("\"bg_checksum\":0}"));
    }
}

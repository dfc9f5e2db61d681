//! Walker for the external extended attribute block referenced by
//! `i_file_acl`.
//!
//! The block starts with a 32-byte header followed by a list of variable
//! length entries, terminated by an entry with a zero name length. Values are
//! stored elsewhere in the same block and located through `e_value_offs`.

use ext3_types::{
    E_NAME_LEN, E_VALUE_OFFS, E_VALUE_SIZE, XATTR_ENTRY, XATTR_ENTRY_MIN_STRIDE, XATTR_HEADER,
    XATTR_HEADER_SIZE, XATTR_MAGIC,
};
use serde::{Serialize, Serializer};

use crate::decode::{DecodedRecord, Radix, decode, to_hex};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XattrEntry {
    pub name: String,
    #[serde(serialize_with = "serialize_hex")]
    pub value: Vec<u8>,
    /// All fixed entry fields, rendered in hex.
    pub raw: DecodedRecord,
}

impl XattrEntry {
    /// Lowercase hex rendering of the value bytes.
    pub fn value_hex(&self) -> String {
        to_hex(&self.value)
    }
}

/// Decoded contents of one extended attribute block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedAttributeBlock {
    /// Absolute image offset of the block, for reporting.
    pub offset: u64,
    pub header: DecodedRecord,
    pub entries: Vec<XattrEntry>,
    /// Block offset at which the walk stopped.
    pub end: usize,
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex(bytes))
}

/// Walk the attribute entries of `block`, read from image offset `offset`.
///
/// Returns `Ok(None)` when the block is entirely zero, meaning the inode has
/// no extended attributes. A list that runs off the end of the block simply
/// ends there.
///
/// Entries are assumed to be `max(16, 16 + name_len)` bytes apart. Real ext3
/// pads each entry to a 4-byte boundary, so blocks whose names are not
/// multiples of four may be read at shifted positions.
pub fn walk(block: &[u8], offset: u64) -> Result<Option<ExtendedAttributeBlock>> {
    if block.iter().all(|&byte| byte == 0) {
        return Ok(None);
    }

    let header = decode(XATTR_HEADER, block, Radix::Hex)?;
    if let Some(magic) = header.get(ext3_types::H_MAGIC) {
        if magic != XATTR_MAGIC {
            log::warn!("xattr block at {offset}: unexpected magic {magic:#x}");
        }
    }

    let mut entries = Vec::new();
    let mut cursor = XATTR_HEADER_SIZE;

    while cursor < block.len() {
        // Fewer than 16 bytes left: the list runs off the block.
        let Ok(raw) = decode(XATTR_ENTRY, &block[cursor..], Radix::Hex) else {
            log::debug!("xattr entry at {cursor} truncated by block end");
            break;
        };

        let name_len = raw.require(E_NAME_LEN)? as usize;
        if name_len == 0 {
            break;
        }

        let name_start = cursor + XATTR_ENTRY_MIN_STRIDE;
        let Some(name_bytes) = block.get(name_start..name_start + name_len) else {
            log::debug!("xattr name at {name_start} truncated by block end");
            break;
        };
        let name = std::str::from_utf8(name_bytes)
            .map_err(|source| Error::CorruptAttribute {
                offset: name_start,
                source,
            })?
            .to_owned();

        // Values reaching past the block are cut at the block end.
        let value_start = (raw.require(E_VALUE_OFFS)? as usize).min(block.len());
        let value_end = value_start
            .saturating_add(raw.require(E_VALUE_SIZE)? as usize)
            .min(block.len());
        let value = block[value_start..value_end].to_vec();

        log::trace!("xattr entry at {cursor}: {name:?}, {} value bytes", value.len());

        entries.push(XattrEntry { name, value, raw });

        cursor += XATTR_ENTRY_MIN_STRIDE.max(name_len + XATTR_ENTRY_MIN_STRIDE);
    }

    Ok(Some(ExtendedAttributeBlock {
        offset,
        header,
        entries,
        end: cursor,
    }))
}

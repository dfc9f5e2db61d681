//! Address resolution from the superblock down to a single inode, and
//! in-place patching of that inode.

use std::path::PathBuf;

use ext3_types::{
    GOOD_OLD_INODE_SIZE, GROUP_DESCRIPTOR, GROUP_DESCRIPTOR_SIZE, GROUP_DESCRIPTOR_TABLE_OFFSET,
    MAX_LOG_BLOCK_SIZE, MIN_BLOCK_SIZE, SUPERBLOCK, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE, Schema,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::decode::{
    DecodedRecord, Radix, decode, encode_uint, field_bytes, read_uint, to_hex,
};
use crate::image::ImageFile;
use crate::xattr::{self, ExtendedAttributeBlock};
use crate::{Error, Result};

/// Block size and the block group holding the session's inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilesystemGeometry {
    pub block_size: u64,
    pub block_group: u64,
}

impl FilesystemGeometry {
    pub fn from_superblock(superblock: &DecodedRecord, inode: u64) -> Result<Self> {
        check_inode(inode)?;

        let log_block_size = superblock.require(ext3_types::S_LOG_BLOCK_SIZE)?;
        if log_block_size > MAX_LOG_BLOCK_SIZE {
            return Err(Error::InvalidGeometry(format!(
                "s_log_block_size {log_block_size} exceeds {MAX_LOG_BLOCK_SIZE}"
            )));
        }

        let inodes_per_group = superblock.require(ext3_types::S_INODES_PER_GROUP)?;
        if inodes_per_group == 0 {
            return Err(Error::InvalidGeometry("s_inodes_per_group is zero".into()));
        }

        Ok(Self {
            block_size: MIN_BLOCK_SIZE << log_block_size,
            block_group: (inode - 1) / inodes_per_group,
        })
    }

    /// Absolute offset of block `block`.
    pub fn block_offset(&self, block: u64) -> u64 {
        block * self.block_size
    }
}

/// Outcome of a single inode field patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub field: &'static str,
    /// Absolute offset of the inode record.
    pub record_offset: u64,
    /// Absolute offset of the patched field.
    pub field_offset: u64,
    pub old: u64,
    pub new: u64,
    /// SHA-256 of the whole inode record before the write.
    pub before_sha256: String,
    /// SHA-256 of the whole inode record as written.
    pub after_sha256: String,
}

/// An image opened for inspection of one inode.
///
/// Only the superblock and the geometry derived from it are kept. Every other
/// accessor goes back to the image, so a patch is reflected immediately.
#[derive(Debug, Clone)]
pub struct FilesystemSession {
    image: ImageFile,
    inode: u64,
    superblock: DecodedRecord,
    geometry: FilesystemGeometry,
}

impl FilesystemSession {
    /// Read the superblock of `path` and derive the geometry for `inode`
    /// (1-based).
    pub fn open(path: impl Into<PathBuf>, inode: u64) -> Result<Self> {
        check_inode(inode)?;

        let image = ImageFile::new(path);
        let superblock = read_superblock(&image)?;
        let geometry = FilesystemGeometry::from_superblock(&superblock, inode)?;

        let magic = superblock.get(ext3_types::S_MAGIC);
        if magic != Some(ext3_types::EXT3_SUPER_MAGIC) {
            log::warn!(
                "{}: superblock magic {magic:?} is not ext2/3/4",
                image.path().display()
            );
        }
        log::debug!(
            "{}: inode {inode}, block size {}, block group {}",
            image.path().display(),
            geometry.block_size,
            geometry.block_group
        );

        Ok(Self {
            image,
            inode,
            superblock,
            geometry,
        })
    }

    pub fn image(&self) -> &ImageFile {
        &self.image
    }

    pub fn inode_number(&self) -> u64 {
        self.inode
    }

    pub fn geometry(&self) -> FilesystemGeometry {
        self.geometry
    }

    /// Superblock as decoded when the session was opened.
    pub fn superblock(&self) -> &DecodedRecord {
        &self.superblock
    }

    /// Superblock as currently on disk.
    pub fn read_superblock(&self) -> Result<DecodedRecord> {
        read_superblock(&self.image)
    }

    /// The descriptor table is assumed to start at 2048 bytes, which only
    /// holds for 1024-byte blocks.
    pub fn group_descriptor_offset(&self) -> u64 {
        GROUP_DESCRIPTOR_TABLE_OFFSET + self.geometry.block_group * GROUP_DESCRIPTOR_SIZE as u64
    }

    pub fn group_descriptor(&self) -> Result<DecodedRecord> {
        let raw = self
            .image
            .read(self.group_descriptor_offset(), GROUP_DESCRIPTOR_SIZE)?;
        decode(GROUP_DESCRIPTOR, &raw, Radix::Dec)
    }

    pub fn inode_table_offset(&self) -> Result<u64> {
        let table = self
            .group_descriptor()?
            .require(ext3_types::BG_INODE_TABLE)?;
        Ok(self.geometry.block_offset(table))
    }

    /// On-disk inode size. Revision 0 filesystems leave `s_inode_size` unset
    /// and always use 128 bytes.
    pub fn inode_record_size(&self) -> usize {
        match self.superblock.get(ext3_types::S_INODE_SIZE) {
            Some(0) | None => GOOD_OLD_INODE_SIZE,
            Some(size) => size as usize,
        }
    }

    /// Inode fields that fit in this filesystem's inode records.
    pub fn inode_schema(&self) -> Schema {
        ext3_types::inode_schema(self.inode_record_size())
    }

    /// Offset of the inode record.
    ///
    /// The index into the table is the global inode number, not the index
    /// within the inode's block group, so this is only right for inodes of the
    /// first group.
    pub fn inode_offset(&self) -> Result<u64> {
        let table = self.inode_table_offset()?;
        (self.inode - 1)
            .checked_mul(self.inode_record_size() as u64)
            .and_then(|index| index.checked_add(table))
            .ok_or(Error::InvalidInode(self.inode))
    }

    pub fn inode_raw(&self) -> Result<Vec<u8>> {
        self.image
            .read(self.inode_offset()?, self.inode_record_size())
    }

    pub fn inode(&self) -> Result<DecodedRecord> {
        decode(self.inode_schema(), &self.inode_raw()?, Radix::Dec)
    }

    /// Offset of the first direct data block.
    pub fn data_block_offset(&self) -> Result<u64> {
        let block = self.inode()?.require(ext3_types::I_DATA_BLOCK)?;
        Ok(self.geometry.block_offset(block))
    }

    pub fn acl_block_offset(&self) -> Result<u64> {
        let block = self.inode()?.require(ext3_types::I_FILE_ACL)?;
        Ok(self.geometry.block_offset(block))
    }

    /// Contents of the inode's first data block, cut to the file size. Data
    /// beyond the first block is not addressed.
    pub fn data_block(&self) -> Result<Vec<u8>> {
        let inode = self.inode()?;
        let block = inode.require(ext3_types::I_DATA_BLOCK)?;
        let size = inode.require(ext3_types::I_SIZE)?.min(self.geometry.block_size);

        self.image
            .read(self.geometry.block_offset(block), size as usize)
    }

    /// Extended attributes from the inode's ACL block, or `None` when the
    /// inode has none.
    pub fn extended_attributes(&self) -> Result<Option<ExtendedAttributeBlock>> {
        let block = self.inode()?.require(ext3_types::I_FILE_ACL)?;
        if block == 0 {
            return Ok(None);
        }

        let offset = self.geometry.block_offset(block);
        let raw = self.image.read(offset, self.geometry.block_size as usize)?;
        xattr::walk(&raw, offset)
    }

    /// Raw window of the image, for dumps.
    pub fn read_raw(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        self.image.read(offset, size)
    }

    /// Overwrite one inode field on disk, leaving every other byte of the
    /// record untouched.
    pub fn patch_inode_field(&self, name: &str, value: u64) -> Result<PatchReport> {
        let record_offset = self.inode_offset()?;
        let mut record = self.image.read(record_offset, self.inode_record_size())?;

        let field = ext3_types::find(self.inode_schema(), name)
            .ok_or_else(|| Error::UnknownField(name.to_owned()))?;
        let encoded = encode_uint(value, field.width, field.order).ok_or(Error::Overflow {
            field: field.name,
            value,
            width: field.width,
        })?;

        let old = read_uint(field_bytes(field, &record)?, field.order);
        let before_sha256 = to_hex(&Sha256::digest(&record));

        record[field.offset..field.end()].copy_from_slice(&encoded);
        let after_sha256 = to_hex(&Sha256::digest(&record));

        log::info!(
            "inode {}: {} {old} -> {value} at offset {}",
            self.inode,
            field.name,
            record_offset + field.offset as u64
        );
        self.image.write(record_offset, &record)?;

        Ok(PatchReport {
            field: field.name,
            record_offset,
            field_offset: record_offset + field.offset as u64,
            old,
            new: value,
            before_sha256,
            after_sha256,
        })
    }
}

/// Inode numbers start at 1 and fit in 32 bits, which keeps every derived
/// offset within `u64`.
fn check_inode(inode: u64) -> Result<()> {
    if inode == 0 || inode > ext3_types::MAX_INODE_NUMBER {
        return Err(Error::InvalidInode(inode));
    }
    Ok(())
}

fn read_superblock(image: &ImageFile) -> Result<DecodedRecord> {
    let raw = image.read(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
    decode(SUPERBLOCK, &raw, Radix::Dec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn superblock(log_block_size: u64, inodes_per_group: u64) -> DecodedRecord {
        let mut raw = vec![0u8; SUPERBLOCK_SIZE];
        raw[0x18..0x1C].copy_from_slice(&(log_block_size as u32).to_le_bytes());
        raw[0x28..0x2C].copy_from_slice(&(inodes_per_group as u32).to_le_bytes());
        decode(SUPERBLOCK, &raw, Radix::Dec).unwrap()
    }

    #[test]
    fn block_sizes() {
        for (log, size) in [(0, 1024), (1, 2048), (2, 4096), (6, 65536)] {
            let geometry = FilesystemGeometry::from_superblock(&superblock(log, 8), 1).unwrap();
            assert_eq!(geometry.block_size, size);
            assert!(geometry.block_size.is_power_of_two());
        }
    }

    #[test]
    fn block_group_index() {
        let sb = superblock(0, 2048);
        for (inode, group) in [(1, 0), (2048, 0), (2049, 1), (4097, 2), (10_000, 4)] {
            let geometry = FilesystemGeometry::from_superblock(&sb, inode).unwrap();
            assert_eq!(geometry.block_group, group, "inode {inode}");
        }
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            FilesystemGeometry::from_superblock(&superblock(7, 8), 1),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            FilesystemGeometry::from_superblock(&superblock(0, 0), 1),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            FilesystemGeometry::from_superblock(&superblock(0, 8), 0),
            Err(Error::InvalidInode(0))
        ));
        assert!(matches!(
            FilesystemGeometry::from_superblock(&superblock(0, 1), u64::MAX),
            Err(Error::InvalidInode(u64::MAX))
        ));
    }

    #[test]
    fn block_offsets() {
        let geometry = FilesystemGeometry {
            block_size: 4096,
            block_group: 0,
        };
        assert_eq!(geometry.block_offset(0), 0);
        assert_eq!(geometry.block_offset(3), 12288);
    }
}

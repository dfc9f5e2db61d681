// SPDX-License-Identifier: MIT

//! Field layouts for the fixed-size ext3 metadata structures, as described in
//! the kernel's [ext4 Disk Layout](https://docs.kernel.org/filesystems/ext4/ondisk.html)
//! documentation (ext3 is the subset without extents and 64-bit fields).
//!
//! Each structure is described by a [`Schema`]: an ordered list of named
//! [`Field`]s, sorted by offset. Names follow the kernel's C struct members so
//! that dumps can be compared against `debugfs` output.

#![forbid(dead_code, unsafe_code, unused)]

/// Interpretation of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// One named integer field inside a fixed-layout structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    /// Offset from the start of the structure, in bytes.
    pub offset: usize,
    /// Width in bytes, between 1 and 8.
    pub width: usize,
    pub order: ByteOrder,
}

impl Field {
    /// First byte past the end of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }
}

/// Ordered field table for one structure kind.
pub type Schema = &'static [Field];

const fn le(name: &'static str, offset: usize, width: usize) -> Field {
    Field {
        name,
        offset,
        width,
        order: ByteOrder::Little,
    }
}

const fn be(name: &'static str, offset: usize, width: usize) -> Field {
    Field {
        name,
        offset,
        width,
        order: ByteOrder::Big,
    }
}

/// Look up a field by name.
pub fn find(schema: Schema, name: &str) -> Option<&'static Field> {
    schema.iter().find(|field| field.name == name)
}

/// Number of bytes needed to decode every field of `schema`.
pub fn schema_len(schema: Schema) -> usize {
    schema.iter().map(Field::end).max().unwrap_or(0)
}

/// The primary superblock always starts 1024 bytes into the volume, after the
/// boot sector area, regardless of block size.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Start of the group descriptor table for 1024-byte block filesystems, where
/// block 0 is the boot area and block 1 holds the superblock.
pub const GROUP_DESCRIPTOR_TABLE_OFFSET: u64 = 2048;
pub const GROUP_DESCRIPTOR_SIZE: usize = 32;

/// `s_log_block_size` is a shift applied to this base.
pub const MIN_BLOCK_SIZE: u64 = 1024;
/// Largest supported `s_log_block_size` (64 KiB blocks).
pub const MAX_LOG_BLOCK_SIZE: u64 = 6;

/// Inode numbers are stored in 32-bit fields.
pub const MAX_INODE_NUMBER: u64 = u32::MAX as u64;

/// Inode size of revision 0 filesystems.
pub const GOOD_OLD_INODE_SIZE: usize = 128;

pub const EXT3_SUPER_MAGIC: u64 = 0xEF53;

pub const XATTR_MAGIC: u64 = 0xEA02_0000;
pub const XATTR_HEADER_SIZE: usize = 32;
/// Minimum distance between two consecutive attribute entries.
pub const XATTR_ENTRY_MIN_STRIDE: usize = 16;

// Names the address resolver depends on.
pub const S_LOG_BLOCK_SIZE: &str = "s_log_block_size";
pub const S_INODES_PER_GROUP: &str = "s_inodes_per_group";
pub const S_INODE_SIZE: &str = "s_inode_size";
pub const S_REV_LEVEL: &str = "s_rev_level";
pub const S_MAGIC: &str = "s_magic";
pub const BG_INODE_TABLE: &str = "bg_inode_table_lo";
pub const I_SIZE: &str = "i_size";
pub const I_DATA_BLOCK: &str = "i_block[0]";
pub const I_FILE_ACL: &str = "i_file_acl";
pub const E_NAME_LEN: &str = "e_name_len";
pub const E_VALUE_OFFS: &str = "e_value_offs";
pub const E_VALUE_SIZE: &str = "e_value_size";
pub const E_HASH: &str = "e_hash";
pub const H_MAGIC: &str = "h_magic";

/// `struct ext3_super_block`. Byte arrays that are not integers
/// (`s_volume_name`, `s_last_mounted`, `s_hash_seed`, `s_jnl_blocks`) are not
/// decoded. The UUID is split into two big-endian halves so that its hex
/// rendering reads in on-disk order.
pub const SUPERBLOCK: Schema = &[
    le("s_inodes_count", 0x00, 4),
    le("s_blocks_count_lo", 0x04, 4),
    le("s_r_blocks_count_lo", 0x08, 4),
    le("s_free_blocks_count_lo", 0x0C, 4),
    le("s_free_inodes_count", 0x10, 4),
    le("s_first_data_block", 0x14, 4),
    le("s_log_block_size", 0x18, 4),
    le("s_log_frag_size", 0x1C, 4),
    le("s_blocks_per_group", 0x20, 4),
    le("s_frags_per_group", 0x24, 4),
    le("s_inodes_per_group", 0x28, 4),
    le("s_mtime", 0x2C, 4),
    le("s_wtime", 0x30, 4),
    le("s_mnt_count", 0x34, 2),
    le("s_max_mnt_count", 0x36, 2),
    le("s_magic", 0x38, 2),
    le("s_state", 0x3A, 2),
    le("s_errors", 0x3C, 2),
    le("s_minor_rev_level", 0x3E, 2),
    le("s_lastcheck", 0x40, 4),
    le("s_checkinterval", 0x44, 4),
    le("s_creator_os", 0x48, 4),
    le("s_rev_level", 0x4C, 4),
    le("s_def_resuid", 0x50, 2),
    le("s_def_resgid", 0x52, 2),
    le("s_first_ino", 0x54, 4),
    le("s_inode_size", 0x58, 2),
    le("s_block_group_nr", 0x5A, 2),
    le("s_feature_compat", 0x5C, 4),
    le("s_feature_incompat", 0x60, 4),
    le("s_feature_ro_compat", 0x64, 4),
    be("s_uuid_hi", 0x68, 8),
    be("s_uuid_lo", 0x70, 8),
    le("s_algorithm_usage_bitmap", 0xC8, 4),
    le("s_prealloc_blocks", 0xCC, 1),
    le("s_prealloc_dir_blocks", 0xCD, 1),
    le("s_reserved_gdt_blocks", 0xCE, 2),
    be("s_journal_uuid_hi", 0xD0, 8),
    be("s_journal_uuid_lo", 0xD8, 8),
    le("s_journal_inum", 0xE0, 4),
    le("s_journal_dev", 0xE4, 4),
    le("s_last_orphan", 0xE8, 4),
    le("s_def_hash_version", 0xFC, 1),
    le("s_jnl_backup_type", 0xFD, 1),
    le("s_desc_size", 0xFE, 2),
    le("s_default_mount_opts", 0x100, 4),
    le("s_first_meta_bg", 0x104, 4),
    le("s_mkfs_time", 0x108, 4),
    le("s_blocks_count_hi", 0x150, 4),
    le("s_r_blocks_count_hi", 0x154, 4),
    le("s_free_blocks_count_hi", 0x158, 4),
    le("s_min_extra_isize", 0x15C, 2),
    le("s_want_extra_isize", 0x15E, 2),
    le("s_flags", 0x160, 4),
];

/// 32-byte `struct ext4_group_desc`, the layout used when `s_desc_size` is
/// unset.
pub const GROUP_DESCRIPTOR: Schema = &[
    le("bg_block_bitmap_lo", 0x00, 4),
    le("bg_inode_bitmap_lo", 0x04, 4),
    le("bg_inode_table_lo", 0x08, 4),
    le("bg_free_blocks_count_lo", 0x0C, 2),
    le("bg_free_inodes_count_lo", 0x0E, 2),
    le("bg_used_dirs_count_lo", 0x10, 2),
    le("bg_flags", 0x12, 2),
    le("bg_exclude_bitmap_lo", 0x14, 4),
    le("bg_block_bitmap_csum_lo", 0x18, 2),
    le("bg_inode_bitmap_csum_lo", 0x1A, 2),
    le("bg_itable_unused_lo", 0x1C, 2),
    le("bg_checksum", 0x1E, 2),
];

/// `struct ext3_inode` followed by the fields stored in the extra space of
/// large (256-byte) inodes. Use [`inode_schema`] to get the fields that fit in
/// a given record size.
pub const INODE: Schema = &[
    le("i_mode", 0x00, 2),
    le("i_uid", 0x02, 2),
    le("i_size", 0x04, 4),
    le("i_atime", 0x08, 4),
    le("i_ctime", 0x0C, 4),
    le("i_mtime", 0x10, 4),
    le("i_dtime", 0x14, 4),
    le("i_gid", 0x18, 2),
    le("i_links_count", 0x1A, 2),
    le("i_blocks", 0x1C, 4),
    le("i_flags", 0x20, 4),
    le("i_osd1", 0x24, 4),
    le("i_block[0]", 0x28, 4),
    le("i_block[1]", 0x2C, 4),
    le("i_block[2]", 0x30, 4),
    le("i_block[3]", 0x34, 4),
    le("i_block[4]", 0x38, 4),
    le("i_block[5]", 0x3C, 4),
    le("i_block[6]", 0x40, 4),
    le("i_block[7]", 0x44, 4),
    le("i_block[8]", 0x48, 4),
    le("i_block[9]", 0x4C, 4),
    le("i_block[10]", 0x50, 4),
    le("i_block[11]", 0x54, 4),
    le("i_block[12]", 0x58, 4),
    le("i_block[13]", 0x5C, 4),
    le("i_block[14]", 0x60, 4),
    le("i_generation", 0x64, 4),
    le("i_file_acl", 0x68, 4),
    le("i_dir_acl", 0x6C, 4),
    le("i_faddr", 0x70, 4),
    le("l_i_blocks_hi", 0x74, 2),
    le("l_i_file_acl_high", 0x76, 2),
    le("l_i_uid_high", 0x78, 2),
    le("l_i_gid_high", 0x7A, 2),
    le("l_i_checksum_lo", 0x7C, 2),
    le("l_i_reserved", 0x7E, 2),
    // Large inode extra space.
    le("i_extra_isize", 0x80, 2),
    le("i_checksum_hi", 0x82, 2),
    le("i_ctime_extra", 0x84, 4),
    le("i_mtime_extra", 0x88, 4),
    le("i_atime_extra", 0x8C, 4),
    le("i_crtime", 0x90, 4),
    le("i_crtime_extra", 0x94, 4),
    le("i_version_hi", 0x98, 4),
    le("i_projid", 0x9C, 4),
];

/// Prefix of [`INODE`] whose fields fit entirely inside an inode record of
/// `record_size` bytes.
pub fn inode_schema(record_size: usize) -> Schema {
    let count = INODE
        .iter()
        .take_while(|field| field.end() <= record_size)
        .count();
    &INODE[..count]
}

/// `struct ext4_xattr_header`, at the start of an extended attribute block.
/// The trailing `h_reserved` padding is not decoded.
pub const XATTR_HEADER: Schema = &[
    le("h_magic", 0x00, 4),
    le("h_refcount", 0x04, 4),
    le("h_blocks", 0x08, 4),
    le("h_hash", 0x0C, 4),
    le("h_checksum", 0x10, 4),
];

/// Fixed part of `struct ext4_xattr_entry`. The attribute name follows
/// immediately after `e_hash`.
pub const XATTR_ENTRY: Schema = &[
    le("e_name_len", 0x00, 1),
    le("e_name_index", 0x01, 1),
    le("e_value_offs", 0x02, 2),
    le("e_value_inum", 0x04, 4),
    le("e_value_size", 0x08, 4),
    le("e_hash", 0x0C, 4),
];

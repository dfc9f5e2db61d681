#![forbid(unsafe_code)]

//! Read and patch ext3 metadata directly on a raw image.
//!
//! Addresses are computed from the superblock geometry, following the chain
//! superblock, group descriptor, inode table, inode and finally the inode's
//! data and extended attribute blocks. Nothing is mounted and nothing is
//! cached: every accessor re-reads the image.
//!
//! ```no_run
//! use ext3plorer::FilesystemSession;
//!
//! let session = FilesystemSession::open("disk.img", 12)?;
//! let inode = session.inode()?;
//! println!("mode {:o}", inode.get("i_mode").unwrap_or_default());
//!
//! session.patch_inode_field("i_uid", 0)?;
//! # Ok::<(), ext3plorer::Error>(())
//! ```

pub mod decode;
mod error;
pub mod image;
pub mod session;
pub mod xattr;

pub use decode::{DecodedRecord, FieldValue, Radix, decode};
pub use error::{Error, Result};
pub use image::ImageFile;
pub use session::{FilesystemGeometry, FilesystemSession, PatchReport};
pub use xattr::{ExtendedAttributeBlock, XattrEntry};

pub use ext3_types as types;

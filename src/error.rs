use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// Everything that can go wrong while reading or patching an image.
///
/// Errors are never retried or rolled back; the failing operation reports and
/// the session stays usable for the next one.
#[derive(Debug, Error)]
pub enum Error {
    /// The image ended before the requested window.
    #[error("truncated read at offset {offset}: requested {requested} bytes, {available} available")]
    TruncatedRead {
        offset: u64,
        requested: usize,
        available: usize,
    },

    /// A schema field (or a derived range) extends past the decoded buffer.
    #[error("field {field} ends at byte {end} but buffer holds {len} bytes")]
    Bounds {
        field: &'static str,
        end: usize,
        len: usize,
    },

    #[error("unknown inode field: {0}")]
    UnknownField(String),

    #[error("value {value} does not fit in {width}-byte field {field}")]
    Overflow {
        field: &'static str,
        value: u64,
        width: usize,
    },

    /// Attribute name at `offset` within the ACL block is not valid UTF-8.
    #[error("corrupt extended attribute name at block offset {offset}: {source}")]
    CorruptAttribute {
        offset: usize,
        #[source]
        source: Utf8Error,
    },

    #[error("invalid filesystem geometry: {0}")]
    InvalidGeometry(String),

    /// Inode numbers start at 1.
    #[error("invalid inode number {0}")]
    InvalidInode(u64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

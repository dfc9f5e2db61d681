//! Byte-level access to the backing image.
//!
//! Every call opens the file, performs one positioned transfer and closes it
//! again, so no handle is held between operations and a patch is visible to
//! the very next read.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A raw filesystem image, addressed as a flat byte space.
#[derive(Debug, Clone)]
pub struct ImageFile {
    path: PathBuf,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly `size` bytes starting at `offset`.
    pub fn read(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut file = File::options().read(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = Vec::with_capacity(size);
        file.take(size as u64).read_to_end(&mut buf)?;

        if buf.len() < size {
            return Err(Error::TruncatedRead {
                offset,
                requested: size,
                available: buf.len(),
            });
        }

        Ok(buf)
    }

    /// Overwrite `data.len()` bytes at `offset`. The image is never grown: a
    /// write ending past the current end of the image is refused.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut file = File::options().read(true).write(true).open(&self.path)?;

        let image_len = file.metadata()?.len();
        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > image_len) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "write of {} bytes at offset {offset} exceeds image size {image_len}",
                    data.len()
                ),
            )
            .into());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        log::debug!("wrote {} bytes at offset {offset}", data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn image_with(bytes: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().expect("temp file");
        tmp.write_all(bytes).expect("fill temp file");
        tmp.flush().expect("flush temp file");
        tmp
    }

    #[test]
    fn reads_window() {
        let tmp = image_with(&(0u8..64).collect::<Vec<_>>());
        let image = ImageFile::new(tmp.path());

        assert_eq!(image.read(10, 4).unwrap(), vec![10, 11, 12, 13]);
        assert!(image.read(64, 0).unwrap().is_empty());
    }

    #[test]
    fn read_past_end_is_truncated() {
        let tmp = image_with(&[0u8; 32]);
        let image = ImageFile::new(tmp.path());

        match image.read(30, 4) {
            Err(Error::TruncatedRead {
                offset,
                requested,
                available,
            }) => {
                assert_eq!((offset, requested, available), (30, 4, 2));
            }
            other => panic!("expected truncated read, got {other:?}"),
        }

        assert!(matches!(
            image.read(1000, 1),
            Err(Error::TruncatedRead { available: 0, .. })
        ));
    }

    #[test]
    fn write_overwrites_in_place() {
        let tmp = image_with(&[0u8; 16]);
        let image = ImageFile::new(tmp.path());

        image.write(4, &[0xAA, 0xBB]).unwrap();

        let bytes = image.read(0, 16).unwrap();
        assert_eq!(&bytes[3..7], &[0, 0xAA, 0xBB, 0]);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn write_never_grows_image() {
        let tmp = image_with(&[0u8; 16]);
        let image = ImageFile::new(tmp.path());

        let err = image.write(15, &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == ErrorKind::InvalidInput));
        assert_eq!(std::fs::metadata(tmp.path()).unwrap().len(), 16);
    }

    #[test]
    fn missing_image_is_io_error() {
        let image = ImageFile::new("/nonexistent/ext3plorer/image.img");
        assert!(matches!(image.read(0, 1), Err(Error::Io(_))));
    }
}

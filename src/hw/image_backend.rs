use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::memory::{TagMemory, UID_LEN};
use super::transport::{TagPage, TagTransport};
use crate::error::{ImageError, TransportError};

/// A tag backed by a memory dump on disk.
///
/// Every page write is flushed to the file before the call returns.
#[derive(Debug)]
pub struct ImageTag {
    path: PathBuf,
    memory: TagMemory,
}

impl ImageTag {
    /// Opens an existing tag image.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid dump.
    #[instrument(skip_all, level = "debug", fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref().to_path_buf();
        let dump = fs::read(&path).map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })?;
        let memory = TagMemory::from_dump(&dump).map_err(|source| ImageError::Malformed {
            path: path.clone(),
            source,
        })?;
        debug!(len = dump.len(), "loaded tag image");
        Ok(Self { path, memory })
    }

    /// Creates a blank NTAG216 image on disk, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn create_blank(path: impl AsRef<Path>, uid: [u8; UID_LEN]) -> Result<Self, ImageError> {
        let image = Self {
            path: path.as_ref().to_path_buf(),
            memory: TagMemory::blank(uid),
        };
        image.flush()?;
        Ok(image)
    }

    /// Returns the current tag memory.
    #[must_use]
    pub fn memory(&self) -> &TagMemory {
        &self.memory
    }

    fn flush(&self) -> Result<(), ImageError> {
        fs::write(&self.path, self.memory.as_bytes()).map_err(|source| ImageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl TagTransport for ImageTag {
    async fn present(&mut self) -> bool {
        self.path.is_file()
    }

    async fn read_page(&mut self, page: u8) -> Result<TagPage, TransportError> {
        self.memory.read_page(page)
    }

    async fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), TransportError> {
        let previous = self.memory.read_page(page)?;
        self.memory.write_page(page, data)?;
        if let Err(error) = self.flush() {
            self.memory.write_page(page, previous)?;
            return Err(TransportError::Io {
                detail: format!("{error}"),
            });
        }
        Ok(())
    }

    async fn uid(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.memory.uid().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::FixtureError;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spooltag-{}-{name}.bin", std::process::id()))
    }

    #[tokio::test]
    async fn writes_persist_across_reopen() {
        let path = scratch_path("persist");
        let mut image = ImageTag::create_blank(&path, [1, 2, 3, 4, 5, 6, 7])
            .expect("blank image should be created");

        image
            .write_page(6, [0xCA, 0xFE, 0xBA, 0xBE])
            .await
            .expect("user page should be writable");

        let mut reopened = ImageTag::open(&path).expect("image should reopen");
        assert_eq!(Ok([0xCA, 0xFE, 0xBA, 0xBE]), reopened.read_page(6).await);
        assert_eq!(Ok(vec![1, 2, 3, 4, 5, 6, 7]), reopened.uid().await);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_partial_page_dump() {
        let path = scratch_path("partial");
        fs::write(&path, [0u8; 18]).expect("scratch file should be writable");

        let result = ImageTag::open(&path);
        assert_matches!(
            result,
            Err(ImageError::Malformed {
                source: FixtureError::PartialPage { len: 18 },
                ..
            })
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_reports_missing_file() {
        let result = ImageTag::open(scratch_path("missing"));
        assert_matches!(result, Err(ImageError::Io { .. }));
    }
}

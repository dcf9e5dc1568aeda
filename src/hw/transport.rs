use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::fake_backend::{FakeTag, FakeTagConfig};
use super::image_backend::ImageTag;
use crate::error::{BackendError, TransportError};
use crate::protocol::PAGE_SIZE;

/// Contents of one tag page.
pub type TagPage = [u8; PAGE_SIZE];

/// Page-level access to one NFC tag.
///
/// Each call is atomic for its page; multi-page sequences are not.
#[async_trait]
pub trait TagTransport: Send {
    /// Returns whether a tag is currently in the reader field.
    async fn present(&mut self) -> bool;

    /// Reads one page.
    async fn read_page(&mut self, page: u8) -> Result<TagPage, TransportError>;

    /// Writes one page.
    async fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), TransportError>;

    /// Reads the tag's unique identifier.
    async fn uid(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Signals completion to the user, when the reader supports it.
    async fn beep(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Runtime tag backend selection.
#[derive(Debug)]
pub(crate) enum TagBackend {
    Image(PathBuf),
    Fake(FakeTagConfig),
}

/// Builds a transport for the selected backend.
pub(crate) fn tag_transport_from_backend(
    backend: TagBackend,
) -> Result<Box<dyn TagTransport>, BackendError> {
    let transport: Box<dyn TagTransport> = match backend {
        TagBackend::Image(path) => {
            info!(path = %path.display(), "using tag image backend");
            Box::new(ImageTag::open(path)?)
        }
        TagBackend::Fake(config) => {
            info!("using fake tag backend");
            Box::new(FakeTag::new(config)?)
        }
    };

    Ok(transport)
}

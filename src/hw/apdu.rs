use async_trait::async_trait;
use tracing::{instrument, trace};

use super::transport::{TagPage, TagTransport};
use crate::error::TransportError;
use crate::protocol::PAGE_SIZE;
use crate::utils::format_hex;

const CLASS: u8 = 0xFF;
const INS_GET_DATA: u8 = 0xCA;
const INS_READ_BINARY: u8 = 0xB0;
const INS_UPDATE_BINARY: u8 = 0xD6;
const STATUS_OK: (u8, u8) = (0x90, 0x00);
const BEEP_APDU: [u8; 9] = [0xFF, 0x00, 0x40, 0x00, 0x04, 0x01, 0x00, 0x03, 0x03];

/// Response to one APDU: payload followed by the two status bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ApduResponse {
    data: Vec<u8>,
    sw1: u8,
    sw2: u8,
}

impl ApduResponse {
    #[must_use]
    pub fn new(data: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self { data, sw1, sw2 }
    }

    /// Splits a raw response into payload and status words.
    ///
    /// # Errors
    ///
    /// Returns an error when the response is shorter than the status words.
    pub fn from_raw(raw: &[u8]) -> Result<Self, TransportError> {
        let Some((status, data)) = raw
            .len()
            .checked_sub(2)
            .map(|split| (&raw[split..], &raw[..split]))
        else {
            return Err(TransportError::Io {
                detail: format!("short APDU response: {}", format_hex(raw)),
            });
        };
        Ok(Self::new(data.to_vec(), status[0], status[1]))
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn status(&self) -> (u8, u8) {
        (self.sw1, self.sw2)
    }

    fn into_data(self) -> Result<Vec<u8>, TransportError> {
        if self.status() == STATUS_OK {
            Ok(self.data)
        } else {
            Err(TransportError::Status {
                sw1: self.sw1,
                sw2: self.sw2,
            })
        }
    }
}

/// A PC/SC-style card connection that exchanges raw APDUs.
///
/// Implement this over a concrete reader driver to use it through
/// [`ApduTransport`].
#[async_trait]
pub trait CardChannel: Send {
    /// Returns whether a card is in the reader field.
    async fn card_present(&mut self) -> bool;

    /// Sends one command APDU and returns the card's response.
    async fn transmit(&mut self, apdu: &[u8]) -> Result<ApduResponse, TransportError>;
}

/// Tag transport speaking ACR122U pseudo-APDUs over a [`CardChannel`].
#[derive(Debug)]
pub struct ApduTransport<C> {
    channel: C,
}

impl<C: CardChannel> ApduTransport<C> {
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Returns the underlying channel.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.channel
    }

    async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
        trace!(apdu = %format_hex(apdu), "sending APDU");
        let response = self.channel.transmit(apdu).await?;
        trace!(
            data = %format_hex(response.data()),
            sw1 = response.sw1,
            sw2 = response.sw2,
            "received APDU response"
        );
        response.into_data()
    }
}

#[async_trait]
impl<C: CardChannel> TagTransport for ApduTransport<C> {
    async fn present(&mut self) -> bool {
        self.channel.card_present().await
    }

    #[instrument(skip(self), level = "trace")]
    async fn read_page(&mut self, page: u8) -> Result<TagPage, TransportError> {
        let data = self
            .exchange(&[CLASS, INS_READ_BINARY, 0x00, page, PAGE_SIZE as u8])
            .await?;
        // NTAG READ returns four pages; the first one is the requested page.
        let Some(first) = data.get(..PAGE_SIZE) else {
            return Err(TransportError::Io {
                detail: format!("page {page} read returned {} bytes", data.len()),
            });
        };
        let mut page_data = [0u8; PAGE_SIZE];
        page_data.copy_from_slice(first);
        Ok(page_data)
    }

    #[instrument(skip(self, data), level = "trace")]
    async fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), TransportError> {
        let mut apdu = vec![CLASS, INS_UPDATE_BINARY, 0x00, page, PAGE_SIZE as u8];
        apdu.extend_from_slice(&data);
        self.exchange(&apdu).await.map(|_| ())
    }

    async fn uid(&mut self) -> Result<Vec<u8>, TransportError> {
        self.exchange(&[CLASS, INS_GET_DATA, 0x00, 0x00, 0x00]).await
    }

    async fn beep(&mut self) -> Result<(), TransportError> {
        self.exchange(&BEEP_APDU).await.map(|_| ())
    }
}

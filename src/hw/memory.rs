use crate::error::{FixtureError, TransportError};
use crate::protocol::{PAGE_SIZE, RECORD_START_PAGE};

use super::transport::TagPage;

/// Pages in an NTAG216.
pub const NTAG216_PAGES: usize = 231;
/// Length of an NTAG UID.
pub const UID_LEN: usize = 7;
/// UID given to fake tags and new images when none is supplied.
pub const DEFAULT_UID: [u8; UID_LEN] = [0x04, 0x5A, 0x3C, 0x12, 0x9B, 0x6E, 0x80];

const MEMORY_LEN: usize = NTAG216_PAGES * PAGE_SIZE;
const CASCADE_TAG: u8 = 0x88;
const NTAG216_CAPABILITY_CONTAINER: TagPage = [0xE1, 0x10, 0x6D, 0x00];

/// Byte-level model of NTAG216 memory.
///
/// Pages 0-2 hold the UID and its check bytes, page 3 the capability
/// container; user memory starts at page 4.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TagMemory {
    bytes: Vec<u8>,
}

impl TagMemory {
    /// Creates factory-blank memory for a tag with the given UID.
    #[must_use]
    pub fn blank(uid: [u8; UID_LEN]) -> Self {
        let mut bytes = vec![0u8; MEMORY_LEN];
        let check0 = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
        let check1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        bytes[0..4].copy_from_slice(&[uid[0], uid[1], uid[2], check0]);
        bytes[4..8].copy_from_slice(&uid[3..7]);
        bytes[8..12].copy_from_slice(&[check1, 0x48, 0x00, 0x00]);
        bytes[12..16].copy_from_slice(&NTAG216_CAPABILITY_CONTAINER);
        Self { bytes }
    }

    /// Creates blank memory and fills user memory from `user_data`.
    ///
    /// # Errors
    ///
    /// Returns an error when `user_data` is not page-aligned or does not fit.
    pub fn with_user_data(uid: [u8; UID_LEN], user_data: &[u8]) -> Result<Self, FixtureError> {
        let mut memory = Self::blank(uid);
        let start = usize::from(RECORD_START_PAGE) * PAGE_SIZE;
        check_page_aligned(user_data.len(), MEMORY_LEN - start)?;
        memory.bytes[start..start + user_data.len()].copy_from_slice(user_data);
        Ok(memory)
    }

    /// Loads a full memory dump starting at page 0.
    ///
    /// Dumps shorter than the full tag are zero-extended.
    ///
    /// # Errors
    ///
    /// Returns an error when the dump is not page-aligned, too large, or too
    /// small to carry the UID pages.
    pub fn from_dump(dump: &[u8]) -> Result<Self, FixtureError> {
        check_page_aligned(dump.len(), MEMORY_LEN)?;
        let uid_end = usize::from(RECORD_START_PAGE) * PAGE_SIZE;
        if dump.len() < uid_end {
            return Err(FixtureError::ImageTooSmall { len: dump.len() });
        }
        let mut bytes = vec![0u8; MEMORY_LEN];
        bytes[..dump.len()].copy_from_slice(dump);
        Ok(Self { bytes })
    }

    /// Returns the 7-byte UID.
    #[must_use]
    pub fn uid(&self) -> [u8; UID_LEN] {
        [
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[4],
            self.bytes[5],
            self.bytes[6],
            self.bytes[7],
        ]
    }

    /// Reads one page.
    ///
    /// # Errors
    ///
    /// Returns an error when the page is outside tag memory.
    pub fn read_page(&self, page: u8) -> Result<TagPage, TransportError> {
        let range = page_range(page)?;
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(&self.bytes[range]);
        Ok(data)
    }

    /// Writes one user-memory page.
    ///
    /// # Errors
    ///
    /// Returns an error when the page is outside tag memory or below user memory.
    pub fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), TransportError> {
        let range = page_range(page)?;
        if page < RECORD_START_PAGE {
            return Err(TransportError::ReadOnlyPage { page });
        }
        self.bytes[range].copy_from_slice(&data);
        Ok(())
    }

    /// Returns the full memory contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `len` bytes of memory starting at `page`.
    #[must_use]
    pub fn bytes_from_page(&self, page: u8, len: usize) -> &[u8] {
        let start = usize::from(page) * PAGE_SIZE;
        let end = (start + len).min(self.bytes.len());
        &self.bytes[start.min(end)..end]
    }
}

/// Parses a UID from hexadecimal text.
///
/// # Errors
///
/// Returns an error when the text is not hexadecimal or is not exactly 7 bytes.
pub fn parse_uid(value: &str) -> Result<[u8; UID_LEN], FixtureError> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(cleaned)?;
    <[u8; UID_LEN]>::try_from(bytes.as_slice()).map_err(|_| FixtureError::InvalidUidLength {
        expected: UID_LEN,
        actual: bytes.len(),
    })
}

fn page_range(page: u8) -> Result<std::ops::Range<usize>, TransportError> {
    let start = usize::from(page) * PAGE_SIZE;
    if start + PAGE_SIZE > MEMORY_LEN {
        return Err(TransportError::PageOutOfRange { page });
    }
    Ok(start..start + PAGE_SIZE)
}

fn check_page_aligned(len: usize, max: usize) -> Result<(), FixtureError> {
    if !len.is_multiple_of(PAGE_SIZE) {
        return Err(FixtureError::PartialPage { len });
    }
    if len > max {
        return Err(FixtureError::MemoryTooLarge { len, max });
    }
    Ok(())
}

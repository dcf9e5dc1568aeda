use std::ops::Range;

use strum_macros::{Display, EnumIter};

/// Bytes per NTAG page.
pub const PAGE_SIZE: usize = 4;
/// First user-memory page; the spool record starts here.
pub const RECORD_START_PAGE: u8 = 4;
/// Length of the encoded spool record block.
pub const RECORD_BLOCK_LEN: usize = 48;
/// Number of pages occupied by the spool record block.
pub const RECORD_PAGE_COUNT: usize = RECORD_BLOCK_LEN / PAGE_SIZE;
/// Marker identifying a vendor-formatted spool block.
pub const MAGIC: [u8; 3] = *b"SPL";
/// Format version written by this crate.
pub const FORMAT_VERSION: u8 = 1;
/// Highest compatibility version this crate can decode.
pub const COMPATIBILITY_VERSION: u8 = 1;

/// Fields of the on-tag spool record, in block order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum RecordField {
    #[strum(to_string = "format_version")]
    FormatVersion,
    #[strum(to_string = "compatibility_version")]
    CompatibilityVersion,
    #[strum(to_string = "vendor_id")]
    VendorId,
    #[strum(to_string = "material_id")]
    MaterialId,
    #[strum(to_string = "colour")]
    Colour,
    #[strum(to_string = "diameter_microns")]
    DiameterMicrons,
    #[strum(to_string = "total_length_mm")]
    TotalLength,
    #[strum(to_string = "remaining_length_mm")]
    RemainingLength,
    #[strum(to_string = "serial")]
    Serial,
    #[strum(to_string = "manufactured_at")]
    ManufacturedAt,
    #[strum(to_string = "usage_seconds")]
    UsageSeconds,
    #[strum(to_string = "station_id")]
    StationId,
    #[strum(to_string = "reserved")]
    Reserved,
    #[strum(to_string = "magic")]
    Magic,
    #[strum(to_string = "checksum")]
    Checksum,
}

/// Byte placement of one record field inside the block.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct FieldLayout {
    offset: usize,
    len: usize,
}

impl FieldLayout {
    /// Byte offset from the start of the block.
    pub(crate) fn offset(self) -> usize {
        self.offset
    }

    /// Field width in bytes.
    #[cfg(test)]
    pub(crate) fn len(self) -> usize {
        self.len
    }

    /// Byte range covered by the field.
    pub(crate) fn range(self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Returns the page indices covered by the record block, in write order.
pub fn record_pages() -> impl Iterator<Item = u8> {
    (0..RECORD_PAGE_COUNT as u8).map(|offset| RECORD_START_PAGE + offset)
}

/// Returns the page index holding block byte `offset`.
pub(crate) fn page_for_offset(offset: usize) -> u8 {
    RECORD_START_PAGE + (offset / PAGE_SIZE) as u8
}

/// Returns the page holding the magic marker and checksum.
///
/// A block whose marker page is not written cannot decode as a record.
pub fn marker_page() -> u8 {
    page_for_offset(field_layout(RecordField::Magic).offset())
}

/// Returns the byte placement of one field. Multi-byte fields are big-endian.
pub(crate) fn field_layout(field: RecordField) -> FieldLayout {
    let (offset, len) = match field {
        RecordField::FormatVersion => (0, 1),
        RecordField::CompatibilityVersion => (1, 1),
        RecordField::VendorId => (2, 2),
        RecordField::MaterialId => (4, 2),
        RecordField::Colour => (6, 4),
        RecordField::DiameterMicrons => (10, 2),
        RecordField::TotalLength => (12, 4),
        RecordField::RemainingLength => (16, 4),
        RecordField::Serial => (20, 8),
        RecordField::ManufacturedAt => (28, 8),
        RecordField::UsageSeconds => (36, 4),
        RecordField::StationId => (40, 2),
        RecordField::Reserved => (42, 2),
        RecordField::Magic => (44, 3),
        RecordField::Checksum => (47, 1),
    };
    FieldLayout { offset, len }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn layout_is_contiguous_and_fills_block() {
        let mut next_offset = 0usize;
        for field in RecordField::iter() {
            let layout = field_layout(field);
            assert_eq!(next_offset, layout.offset(), "gap before {field}");
            next_offset += layout.len();
        }
        assert_eq!(RECORD_BLOCK_LEN, next_offset);
    }

    #[test]
    fn magic_and_checksum_share_the_final_page() {
        let last_page = record_pages().last().expect("record spans pages");
        let magic = field_layout(RecordField::Magic);
        let checksum = field_layout(RecordField::Checksum);

        assert_eq!(last_page, page_for_offset(magic.offset()));
        assert_eq!(last_page, page_for_offset(checksum.offset()));
        assert_eq!(RECORD_BLOCK_LEN - 1, checksum.offset());
        assert_eq!(last_page, marker_page());
    }

    #[test]
    fn record_pages_start_at_user_memory() {
        let pages: Vec<u8> = record_pages().collect();
        assert_eq!((4..16).collect::<Vec<u8>>(), pages);
    }
}

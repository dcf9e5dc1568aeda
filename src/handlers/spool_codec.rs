use std::fmt;

use thiserror::Error;
use tracing::instrument;

use crate::protocol::{
    COMPATIBILITY_VERSION, FORMAT_VERSION, MAGIC, PAGE_SIZE, RECORD_BLOCK_LEN, RecordField,
    field_layout, record_pages,
};

use super::checksum::Checksum;
use super::record::{InvalidField, SERIAL_LEN, SpoolRecord, SpoolSerial};

/// Errors returned when decoding a spool record block.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// Fewer bytes than one record block were supplied.
    #[error("record block is truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// The magic marker is missing; the tag is blank or holds another format.
    #[error("tag does not carry a spool record")]
    NotVendorFormat,
    /// The stored checksum does not match the block contents.
    #[error("record checksum mismatch: stored {stored:#04X}, computed {computed:#04X}")]
    ChecksumMismatch { stored: u8, computed: u8 },
    /// The block was written by a newer, incompatible format revision.
    #[error("record compatibility version {compatibility} is newer than supported version {supported}")]
    UnsupportedVersion { compatibility: u8, supported: u8 },
    /// The block is intact but carries an out-of-domain field.
    #[error("record carries an invalid field")]
    InvalidField(#[from] InvalidField),
}

/// One encoded spool record, exactly as laid out on the tag.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct RecordBlock([u8; RECORD_BLOCK_LEN]);

impl RecordBlock {
    /// Returns the raw block bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; RECORD_BLOCK_LEN] {
        &self.0
    }

    /// Returns the stored checksum byte.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.0[field_layout(RecordField::Checksum).offset()]
    }

    /// Iterates `(page index, page bytes)` pairs in ascending page order.
    pub fn pages(&self) -> impl Iterator<Item = (u8, [u8; PAGE_SIZE])> + '_ {
        record_pages().zip(self.0.chunks_exact(PAGE_SIZE)).map(|(page, chunk)| {
            let mut data = [0u8; PAGE_SIZE];
            data.copy_from_slice(chunk);
            (page, data)
        })
    }
}

impl fmt::Debug for RecordBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordBlock")
            .field(&crate::utils::format_hex(&self.0))
            .finish()
    }
}

impl From<[u8; RECORD_BLOCK_LEN]> for RecordBlock {
    fn from(bytes: [u8; RECORD_BLOCK_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RecordBlock {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let Some(window) = bytes.get(..RECORD_BLOCK_LEN) else {
            return Err(DecodeError::Truncated {
                expected: RECORD_BLOCK_LEN,
                actual: bytes.len(),
            });
        };
        let mut block = [0u8; RECORD_BLOCK_LEN];
        block.copy_from_slice(window);
        Ok(Self(block))
    }
}

/// What a tag's record area holds.
#[derive(Debug, Clone, PartialEq)]
pub enum TagContents {
    /// A valid vendor spool record.
    Spool(SpoolRecord),
    /// Factory-blank memory (all `0x00` or all `0xFF`).
    Blank,
    /// Some other, non-vendor data.
    Foreign,
}

/// Pure encoder/decoder for the on-tag spool record.
pub struct SpoolCodec;

impl SpoolCodec {
    /// Encodes a record into its tag block.
    ///
    /// The record is validated before any byte is produced.
    ///
    /// # Errors
    ///
    /// Returns an error when a field is outside its legal domain.
    ///
    /// ```
    /// use spooltag::{SpoolCodec, SpoolRecord};
    ///
    /// let record = SpoolRecord::builder()
    ///     .vendor_id(0x1A2B)
    ///     .material_id(0x0005)
    ///     .colour(0x00FF00)
    ///     .diameter_microns(2850)
    ///     .total_length_mm(500_000)
    ///     .remaining_length_mm(500_000)
    ///     .station_id(0)
    ///     .build();
    /// let block = SpoolCodec::encode(&record)?;
    /// assert_eq!(0x7A, block.checksum());
    /// assert_eq!(record, SpoolCodec::decode(block.as_bytes())?);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[instrument(skip(record), level = "trace", fields(vendor_id = record.vendor_id(), material_id = record.material_id()))]
    pub fn encode(record: &SpoolRecord) -> Result<RecordBlock, InvalidField> {
        record.validate()?;

        let mut block = [0u8; RECORD_BLOCK_LEN];
        put(&mut block, RecordField::FormatVersion, &[FORMAT_VERSION]);
        put(
            &mut block,
            RecordField::CompatibilityVersion,
            &[COMPATIBILITY_VERSION],
        );
        put(
            &mut block,
            RecordField::VendorId,
            &record.vendor_id().to_be_bytes(),
        );
        put(
            &mut block,
            RecordField::MaterialId,
            &record.material_id().to_be_bytes(),
        );
        put(&mut block, RecordField::Colour, &record.colour().to_be_bytes());
        put(
            &mut block,
            RecordField::DiameterMicrons,
            &record.diameter_microns().to_be_bytes(),
        );
        put(
            &mut block,
            RecordField::TotalLength,
            &record.total_length_mm().to_be_bytes(),
        );
        put(
            &mut block,
            RecordField::RemainingLength,
            &record.remaining_length_mm().to_be_bytes(),
        );
        put(&mut block, RecordField::Serial, record.serial().as_bytes());
        put(
            &mut block,
            RecordField::ManufacturedAt,
            &record.manufactured_at_unix().to_be_bytes(),
        );
        put(
            &mut block,
            RecordField::UsageSeconds,
            &record.usage_seconds().to_be_bytes(),
        );
        put(
            &mut block,
            RecordField::StationId,
            &record.station_id().to_be_bytes(),
        );
        put(&mut block, RecordField::Magic, &MAGIC);

        let checksum_offset = field_layout(RecordField::Checksum).offset();
        block[checksum_offset] = Checksum::compute(&block[..checksum_offset]);
        Ok(RecordBlock(block))
    }

    /// Decodes a record from tag bytes.
    ///
    /// Bytes past the first block are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the input is shorter than one block, the magic
    /// marker is missing, the checksum does not match, the compatibility
    /// version is unsupported, or a field is outside its domain.
    #[instrument(skip(bytes), level = "trace", fields(len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<SpoolRecord, DecodeError> {
        let RecordBlock(block) = RecordBlock::try_from(bytes)?;

        if block[field_layout(RecordField::Magic).range()] != MAGIC {
            return Err(DecodeError::NotVendorFormat);
        }

        let checksum_offset = field_layout(RecordField::Checksum).offset();
        let stored = block[checksum_offset];
        let computed = Checksum::compute(&block[..checksum_offset]);
        if stored != computed {
            return Err(DecodeError::ChecksumMismatch { stored, computed });
        }

        let compatibility = block[field_layout(RecordField::CompatibilityVersion).offset()];
        if compatibility > COMPATIBILITY_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                compatibility,
                supported: COMPATIBILITY_VERSION,
            });
        }

        let record = SpoolRecord::builder()
            .vendor_id(u16::from_be_bytes(take(&block, RecordField::VendorId)))
            .material_id(u16::from_be_bytes(take(&block, RecordField::MaterialId)))
            .colour(u32::from_be_bytes(take(&block, RecordField::Colour)))
            .diameter_microns(u16::from_be_bytes(take(
                &block,
                RecordField::DiameterMicrons,
            )))
            .total_length_mm(u32::from_be_bytes(take(&block, RecordField::TotalLength)))
            .remaining_length_mm(u32::from_be_bytes(take(
                &block,
                RecordField::RemainingLength,
            )))
            .serial(SpoolSerial::new(take::<SERIAL_LEN>(
                &block,
                RecordField::Serial,
            )))
            .manufactured_at(u64::from_be_bytes(take(&block, RecordField::ManufacturedAt)))
            .usage_seconds(u32::from_be_bytes(take(&block, RecordField::UsageSeconds)))
            .station_id(u16::from_be_bytes(take(&block, RecordField::StationId)))
            .build();
        record.validate()?;
        Ok(record)
    }

    /// Classifies tag bytes as a spool record, blank memory, or foreign data.
    ///
    /// # Errors
    ///
    /// Returns an error for truncated input and for vendor blocks that fail
    /// integrity checks; those are corrupted records, not foreign data.
    pub fn inspect(bytes: &[u8]) -> Result<TagContents, DecodeError> {
        match Self::decode(bytes) {
            Ok(record) => Ok(TagContents::Spool(record)),
            Err(DecodeError::NotVendorFormat) => {
                let window = &bytes[..RECORD_BLOCK_LEN];
                let blank = window.iter().all(|byte| *byte == 0x00)
                    || window.iter().all(|byte| *byte == 0xFF);
                Ok(if blank {
                    TagContents::Blank
                } else {
                    TagContents::Foreign
                })
            }
            Err(error) => Err(error),
        }
    }
}

fn put(block: &mut [u8; RECORD_BLOCK_LEN], field: RecordField, bytes: &[u8]) {
    block[field_layout(field).range()].copy_from_slice(bytes);
}

fn take<const N: usize>(block: &[u8; RECORD_BLOCK_LEN], field: RecordField) -> [u8; N] {
    let mut value = [0u8; N];
    value.copy_from_slice(&block[field_layout(field).range()]);
    value
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::handlers::MaterialFamily;
    use crate::utils::format_pages;

    fn example_record() -> SpoolRecord {
        SpoolRecord::builder()
            .vendor_id(0x1A2B)
            .material_id(MaterialFamily::Pla.id())
            .colour(0x00FF00)
            .diameter_microns(2850)
            .total_length_mm(500_000)
            .remaining_length_mm(500_000)
            .station_id(0)
            .build()
    }

    fn encoded_example() -> [u8; RECORD_BLOCK_LEN] {
        *SpoolCodec::encode(&example_record())
            .expect("example record should encode")
            .as_bytes()
    }

    #[test]
    fn example_record_encodes_to_documented_layout() {
        let block = SpoolCodec::encode(&example_record()).expect("example record should encode");

        assert_eq!(0x7A, block.checksum());
        assert_snapshot!(format_pages(4, block.as_bytes()), @r"
        [04] 01 01 1A 2B
        [05] 00 05 00 00
        [06] FF 00 0B 22
        [07] 00 07 A1 20
        [08] 00 07 A1 20
        [09] 00 00 00 00
        [0A] 00 00 00 00
        [0B] 00 00 00 00
        [0C] 00 00 00 00
        [0D] 00 00 00 00
        [0E] 00 00 00 00
        [0F] 53 50 4C 7A
        ");
    }

    #[test]
    fn example_record_round_trips() {
        let block = encoded_example();
        assert_eq!(Ok(example_record()), SpoolCodec::decode(&block));
    }

    #[test]
    fn incrementing_first_byte_is_a_checksum_mismatch() {
        let mut block = encoded_example();
        block[0] += 1;
        assert_matches!(
            SpoolCodec::decode(&block),
            Err(DecodeError::ChecksumMismatch { stored: 0x7A, .. })
        );
    }

    #[test]
    fn any_bit_flip_outside_magic_is_a_checksum_mismatch() {
        let block = encoded_example();
        let magic = field_layout(RecordField::Magic).range();

        for index in (0..RECORD_BLOCK_LEN).filter(|index| !magic.contains(index)) {
            for bit in 0..8 {
                let mut flipped = block;
                flipped[index] ^= 1 << bit;
                assert_matches!(
                    SpoolCodec::decode(&flipped),
                    Err(DecodeError::ChecksumMismatch { .. }),
                    "byte {index} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn any_bit_flip_inside_magic_is_not_vendor_format() {
        let block = encoded_example();
        for index in field_layout(RecordField::Magic).range() {
            for bit in 0..8 {
                let mut flipped = block;
                flipped[index] ^= 1 << bit;
                assert_matches!(SpoolCodec::decode(&flipped), Err(DecodeError::NotVendorFormat));
            }
        }
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(RECORD_BLOCK_LEN - 1)]
    fn short_input_is_truncated(#[case] len: usize) {
        let block = encoded_example();
        assert_eq!(
            Err(DecodeError::Truncated {
                expected: RECORD_BLOCK_LEN,
                actual: len,
            }),
            SpoolCodec::decode(&block[..len])
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encoded_example().to_vec();
        bytes.extend_from_slice(&[0xAA; 16]);
        assert_eq!(Ok(example_record()), SpoolCodec::decode(&bytes));
    }

    #[test]
    fn newer_compatibility_version_is_rejected() {
        let mut block = encoded_example();
        block[1] = COMPATIBILITY_VERSION + 1;
        let checksum_offset = RECORD_BLOCK_LEN - 1;
        block[checksum_offset] = Checksum::compute(&block[..checksum_offset]);

        assert_matches!(
            SpoolCodec::decode(&block),
            Err(DecodeError::UnsupportedVersion {
                compatibility: 2,
                supported: 1,
            })
        );
    }

    #[test]
    fn checksummed_block_with_invalid_diameter_is_rejected() {
        let mut block = encoded_example();
        block[field_layout(RecordField::DiameterMicrons).range()]
            .copy_from_slice(&1234u16.to_be_bytes());
        let checksum_offset = RECORD_BLOCK_LEN - 1;
        block[checksum_offset] = Checksum::compute(&block[..checksum_offset]);

        assert_matches!(
            SpoolCodec::decode(&block),
            Err(DecodeError::InvalidField(InvalidField::Diameter { microns: 1234 }))
        );
    }

    #[test]
    fn encode_rejects_invalid_record_without_output() {
        let record = example_record().with_remaining_length_mm(600_000);
        assert_matches!(
            SpoolCodec::encode(&record),
            Err(InvalidField::RemainingExceedsTotal { .. })
        );
    }

    #[rstest]
    #[case::zeroes([0x00; RECORD_BLOCK_LEN], TagContents::Blank)]
    #[case::erased([0xFF; RECORD_BLOCK_LEN], TagContents::Blank)]
    #[case::ndef_message(
        {
            let mut bytes = [0x00; RECORD_BLOCK_LEN];
            bytes[..4].copy_from_slice(&[0x03, 0x2C, 0xD4, 0x0F]);
            bytes
        },
        TagContents::Foreign
    )]
    fn inspect_classifies_non_vendor_memory(
        #[case] bytes: [u8; RECORD_BLOCK_LEN],
        #[case] expected: TagContents,
    ) {
        assert_eq!(Ok(expected), SpoolCodec::inspect(&bytes));
    }

    #[test]
    fn inspect_keeps_corruption_as_error() {
        let mut block = encoded_example();
        block[10] ^= 0x01;
        assert_matches!(
            SpoolCodec::inspect(&block),
            Err(DecodeError::ChecksumMismatch { .. })
        );
    }

    #[test]
    fn pages_cover_block_in_ascending_order() {
        let block = SpoolCodec::encode(&example_record()).expect("example record should encode");
        let pages: Vec<(u8, [u8; PAGE_SIZE])> = block.pages().collect();

        assert_eq!(12, pages.len());
        assert_eq!((4, [0x01, 0x01, 0x1A, 0x2B]), pages[0]);
        assert_eq!((15, [0x53, 0x50, 0x4C, 0x7A]), pages[11]);
    }
}

use crc::{CRC_8_SMBUS, Crc};

/// CRC-8 (poly `0x07`, init `0x00`, unreflected) as written by the spool tag tooling.
static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum engine for spool record blocks.
pub struct Checksum;

impl Checksum {
    /// Computes the CRC-8 of `bytes`.
    ///
    /// ```
    /// use spooltag::Checksum;
    ///
    /// assert_eq!(0xF4, Checksum::compute(b"123456789"));
    /// ```
    #[must_use]
    pub fn compute(bytes: &[u8]) -> u8 {
        CRC8.checksum(bytes)
    }

    /// Returns whether `bytes` hash to `expected`.
    #[must_use]
    pub fn verify(bytes: &[u8], expected: u8) -> bool {
        Self::compute(bytes) == expected
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty(&[], 0x00)]
    #[case::check_string(b"123456789", 0xF4)]
    #[case::single_one(&[0x01], 0x07)]
    #[case::all_zero(&[0x00, 0x00, 0x00, 0x00], 0x00)]
    fn compute_matches_known_values(#[case] input: &[u8], #[case] expected: u8) {
        assert_eq!(expected, Checksum::compute(input));
    }

    #[test]
    fn verify_rejects_wrong_value() {
        assert!(Checksum::verify(b"123456789", 0xF4));
        assert!(!Checksum::verify(b"123456789", 0xF5));
    }

    #[test]
    fn every_single_bit_flip_changes_checksum() {
        let payload: Vec<u8> = (0u8..47).collect();
        let original = Checksum::compute(&payload);

        for index in 0..payload.len() {
            for bit in 0..8 {
                let mut flipped = payload.clone();
                flipped[index] ^= 1 << bit;
                assert_ne!(original, Checksum::compute(&flipped), "byte {index} bit {bit}");
            }
        }
    }
}

mod checksum;
mod record;
mod spool_codec;

pub use self::checksum::Checksum;
pub use self::record::{
    DEFAULT_STATION_ID, Diameter, InvalidField, KnownVendor, MaterialFamily, Rgb, SERIAL_LEN,
    SerialParseError, SpoolRecord, SpoolSerial, Vendor, length_mm_from_meters,
};
pub use self::spool_codec::{DecodeError, RecordBlock, SpoolCodec, TagContents};

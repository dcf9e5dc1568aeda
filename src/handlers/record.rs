use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use serde::Serialize;
use serde_with::SerializeDisplay;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use thiserror::Error;
use time::OffsetDateTime;

/// Width of the per-spool serial field.
pub const SERIAL_LEN: usize = 8;
/// Programming station id used when none is given.
pub const DEFAULT_STATION_ID: u16 = 0xAFFE;

const MAX_COLOUR: u32 = 0x00FF_FFFF;

/// A record field outside its legal domain.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum InvalidField {
    /// Diameter is not one of the supported nominal sizes.
    #[error("diameter {microns} µm is not supported; expected 1750 or 2850")]
    Diameter { microns: u16 },
    /// Colour uses bits above the 24-bit RGB range.
    #[error("colour {value:#010X} is outside the 24-bit RGB range")]
    Colour { value: u32 },
    /// Remaining length is longer than the spool's total length.
    #[error("remaining length {remaining_mm} mm exceeds total length {total_mm} mm")]
    RemainingExceedsTotal { remaining_mm: u32, total_mm: u32 },
    /// A length given in metres cannot be stored in the millimetre field.
    #[error("length {meters} m cannot be stored as whole millimetres")]
    LengthOutOfRange { meters: f64 },
}

/// Spool manufacturers with an assigned vendor id.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter)]
pub enum KnownVendor {
    #[strum(to_string = "Ultimaker")]
    Ultimaker,
    #[strum(to_string = "Prusament")]
    Prusament,
    #[strum(to_string = "Polymaker")]
    Polymaker,
    #[strum(to_string = "colorFabb")]
    ColorFabb,
}

impl KnownVendor {
    /// Returns the on-tag vendor id.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Ultimaker => 0x0001,
            Self::Prusament => 0x0002,
            Self::Polymaker => 0x0003,
            Self::ColorFabb => 0x0004,
        }
    }
}

/// Vendor classification of a raw vendor id.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Vendor {
    /// A vendor from the known-vendor table.
    Known(KnownVendor),
    /// Any other id; treated as a generic material.
    Unknown(u16),
}

impl Vendor {
    /// Classifies a raw vendor id.
    ///
    /// ```
    /// use spooltag::{KnownVendor, Vendor};
    ///
    /// assert_eq!(Vendor::Known(KnownVendor::Ultimaker), Vendor::from_id(0x0001));
    /// assert_eq!(Vendor::Unknown(0x1A2B), Vendor::from_id(0x1A2B));
    /// ```
    #[must_use]
    pub fn from_id(id: u16) -> Self {
        KnownVendor::iter()
            .find(|vendor| vendor.id() == id)
            .map_or(Self::Unknown(id), Self::Known)
    }

    /// Returns the raw vendor id.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Known(vendor) => vendor.id(),
            Self::Unknown(id) => id,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(vendor) => write!(f, "{vendor}"),
            Self::Unknown(_id) => write!(f, "generic"),
        }
    }
}

/// Well-known material family codes shared across vendors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter)]
pub enum MaterialFamily {
    #[strum(to_string = "ABS")]
    Abs,
    #[strum(to_string = "PETG")]
    Petg,
    #[strum(to_string = "Nylon")]
    Nylon,
    #[strum(to_string = "TPU")]
    Tpu,
    #[strum(to_string = "PLA")]
    Pla,
    #[strum(to_string = "PC")]
    Pc,
    #[strum(to_string = "PVA")]
    Pva,
    #[strum(to_string = "CPE")]
    Cpe,
}

impl MaterialFamily {
    /// Returns the material code for this family.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Abs => 0x0001,
            Self::Petg => 0x0002,
            Self::Nylon => 0x0003,
            Self::Tpu => 0x0004,
            Self::Pla => 0x0005,
            Self::Pc => 0x0006,
            Self::Pva => 0x0007,
            Self::Cpe => 0x0008,
        }
    }

    /// Returns the family for a well-known material code.
    #[must_use]
    pub fn from_id(id: u16) -> Option<Self> {
        Self::iter().find(|family| family.id() == id)
    }
}

/// Supported nominal filament diameters.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter)]
pub enum Diameter {
    #[strum(to_string = "1.75 mm")]
    Standard,
    #[strum(to_string = "2.85 mm")]
    Large,
}

impl Diameter {
    /// Returns the diameter in microns.
    #[must_use]
    pub const fn microns(self) -> u16 {
        match self {
            Self::Standard => 1750,
            Self::Large => 2850,
        }
    }
}

impl TryFrom<u16> for Diameter {
    type Error = InvalidField;

    fn try_from(microns: u16) -> Result<Self, Self::Error> {
        match microns {
            1750 => Ok(Self::Standard),
            2850 => Ok(Self::Large),
            _ => Err(InvalidField::Diameter { microns }),
        }
    }
}

/// An 8-bit-per-channel display colour.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, SerializeDisplay)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Creates a colour from channel values.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Packs the colour as `0x00RRGGBB`.
    #[must_use]
    pub const fn packed(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }
}

impl TryFrom<u32> for Rgb {
    type Error = InvalidField;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > MAX_COLOUR {
            return Err(InvalidField::Colour { value });
        }
        let [_, red, green, blue] = value.to_be_bytes();
        Ok(Self::new(red, green, blue))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Fixed-width per-spool serial.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, SerializeDisplay)]
pub struct SpoolSerial([u8; SERIAL_LEN]);

impl SpoolSerial {
    /// The all-zero serial used by blank records.
    pub const ZERO: Self = Self([0; SERIAL_LEN]);

    /// Wraps raw serial bytes.
    #[must_use]
    pub const fn new(bytes: [u8; SERIAL_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a serial from a tag UID, left-aligned and zero-padded.
    ///
    /// UIDs longer than the serial field are truncated.
    #[must_use]
    pub fn from_uid(uid: &[u8]) -> Self {
        let mut bytes = [0u8; SERIAL_LEN];
        let copied = uid.len().min(SERIAL_LEN);
        bytes[..copied].copy_from_slice(&uid[..copied]);
        Self(bytes)
    }

    /// Returns the raw serial bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SERIAL_LEN] {
        &self.0
    }
}

impl fmt::Display for SpoolSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|byte| format!("{byte:02X}")).collect();
        write!(f, "{}", rendered.join(":"))
    }
}

/// Errors returned when parsing a serial from text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerialParseError {
    #[error("serial is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("serial must be at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },
}

impl FromStr for SpoolSerial {
    type Err = SerialParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let bytes = hex::decode(cleaned)?;
        if bytes.len() > SERIAL_LEN {
            return Err(SerialParseError::TooLong {
                max: SERIAL_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self::from_uid(&bytes))
    }
}

/// Converts a length in metres to whole millimetres.
///
/// # Errors
///
/// Returns an error when the value is negative, not finite, or does not fit in 32 bits.
///
/// ```
/// assert_eq!(500_000, spooltag::length_mm_from_meters(500.0)?);
/// # Ok::<(), spooltag::InvalidField>(())
/// ```
pub fn length_mm_from_meters(meters: f64) -> Result<u32, InvalidField> {
    let millimetres = (meters * 1000.0).round();
    if !millimetres.is_finite() || millimetres < 0.0 || millimetres > f64::from(u32::MAX) {
        return Err(InvalidField::LengthOutOfRange { meters });
    }
    Ok(millimetres as u32)
}

/// Decoded material identity of one filament spool.
#[derive(Debug, Clone, Eq, PartialEq, Builder, Serialize)]
pub struct SpoolRecord {
    vendor_id: u16,
    material_id: u16,
    #[builder(default = 0x00FF_FFFF)]
    colour: u32,
    #[builder(default = Diameter::Large.microns())]
    diameter_microns: u16,
    total_length_mm: u32,
    remaining_length_mm: u32,
    #[builder(default)]
    serial: SpoolSerial,
    #[builder(default)]
    manufactured_at: u64,
    #[builder(default)]
    usage_seconds: u32,
    #[builder(default = DEFAULT_STATION_ID)]
    station_id: u16,
}

impl SpoolRecord {
    /// Checks every field against its legal domain.
    ///
    /// # Errors
    ///
    /// Returns the first field found outside its domain.
    pub fn validate(&self) -> Result<(), InvalidField> {
        Diameter::try_from(self.diameter_microns)?;
        Rgb::try_from(self.colour)?;
        if self.remaining_length_mm > self.total_length_mm {
            return Err(InvalidField::RemainingExceedsTotal {
                remaining_mm: self.remaining_length_mm,
                total_mm: self.total_length_mm,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    #[must_use]
    pub fn vendor(&self) -> Vendor {
        Vendor::from_id(self.vendor_id)
    }

    #[must_use]
    pub fn material_id(&self) -> u16 {
        self.material_id
    }

    /// Returns the generic material family, when the material code is well known.
    #[must_use]
    pub fn material_family(&self) -> Option<MaterialFamily> {
        MaterialFamily::from_id(self.material_id)
    }

    /// Returns the packed `0x00RRGGBB` colour.
    #[must_use]
    pub fn colour(&self) -> u32 {
        self.colour
    }

    /// Returns the colour as channels, if it is within the RGB range.
    #[must_use]
    pub fn rgb(&self) -> Option<Rgb> {
        Rgb::try_from(self.colour).ok()
    }

    #[must_use]
    pub fn diameter_microns(&self) -> u16 {
        self.diameter_microns
    }

    #[must_use]
    pub fn diameter(&self) -> Option<Diameter> {
        Diameter::try_from(self.diameter_microns).ok()
    }

    #[must_use]
    pub fn total_length_mm(&self) -> u32 {
        self.total_length_mm
    }

    #[must_use]
    pub fn remaining_length_mm(&self) -> u32 {
        self.remaining_length_mm
    }

    /// Remaining filament length in metres.
    #[must_use]
    pub fn remaining_length_meters(&self) -> f64 {
        f64::from(self.remaining_length_mm) / 1000.0
    }

    /// Total filament length in metres.
    #[must_use]
    pub fn total_length_meters(&self) -> f64 {
        f64::from(self.total_length_mm) / 1000.0
    }

    #[must_use]
    pub fn serial(&self) -> SpoolSerial {
        self.serial
    }

    /// Manufacturing time as unix seconds.
    #[must_use]
    pub fn manufactured_at_unix(&self) -> u64 {
        self.manufactured_at
    }

    /// Manufacturing time, when it is representable.
    #[must_use]
    pub fn manufactured_at(&self) -> Option<OffsetDateTime> {
        let seconds = i64::try_from(self.manufactured_at).ok()?;
        OffsetDateTime::from_unix_timestamp(seconds).ok()
    }

    #[must_use]
    pub fn usage(&self) -> Duration {
        Duration::from_secs(u64::from(self.usage_seconds))
    }

    #[must_use]
    pub fn usage_seconds(&self) -> u32 {
        self.usage_seconds
    }

    #[must_use]
    pub fn station_id(&self) -> u16 {
        self.station_id
    }

    /// Returns a copy with a different serial.
    #[must_use]
    pub fn with_serial(mut self, serial: SpoolSerial) -> Self {
        self.serial = serial;
        self
    }

    /// Returns a copy with a different remaining length.
    #[must_use]
    pub fn with_remaining_length_mm(mut self, remaining_length_mm: u32) -> Self {
        self.remaining_length_mm = remaining_length_mm;
        self
    }
}

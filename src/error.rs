use std::path::PathBuf;
use std::time::Duration;

use derive_more::From;
use thiserror::Error;

use crate::handlers::{DecodeError, InvalidField};
use crate::hw::SessionPhase;

/// Errors returned by a tag transport for one page-level operation.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    #[error("tag did not respond within {}", humantime::format_duration(*timeout))]
    Timeout { timeout: Duration },
    #[error("no tag is present on the reader")]
    NotPresent,
    #[error("tag I/O failed: {detail}")]
    Io { detail: String },
    #[error("reader returned status {sw1:02X} {sw2:02X}")]
    Status { sw1: u8, sw2: u8 },
    #[error("page {page:#04X} is outside tag memory")]
    PageOutOfRange { page: u8 },
    #[error("page {page:#04X} is not writable")]
    ReadOnlyPage { page: u8 },
}

/// Errors returned by a tag read or write session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// The record was rejected before any tag I/O.
    #[error("record cannot be written")]
    InvalidRecord(#[source] InvalidField),
    #[error("no tag present while {phase}")]
    NoTag { phase: SessionPhase },
    #[error("tag presence check failed while {phase}")]
    PresenceFailed {
        phase: SessionPhase,
        source: TransportError,
    },
    #[error("failed to read the tag UID")]
    IdentifyFailed { source: TransportError },
    #[error("failed to read page {page:#04X} while {phase}")]
    ReadFailed {
        phase: SessionPhase,
        page: u8,
        source: TransportError,
    },
    #[error("failed to write page {page:#04X}")]
    WriteFailed { page: u8, source: TransportError },
    #[error("tag data could not be decoded")]
    DecodeFailed(#[from] DecodeError),
    #[error("read-back differs from written data at page {page:#04X} after {attempts} attempts")]
    WriteVerifyFailed { attempts: u8, page: u8 },
    #[error("{phase} was cancelled before page {page:#04X}")]
    Aborted { phase: SessionPhase, page: u8 },
}

/// Errors returned by the materials catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no catalog entry for vendor {vendor_id:#06X}, material {material_id:#06X}")]
    NotFound { vendor_id: u16, material_id: u16 },
    #[error("failed to read catalog file `{}`", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("catalog file is not valid JSON")]
    Parse(#[from] serde_json::Error),
    #[error("catalog lists vendor {vendor_id:#06X}, material {material_id:#06X} more than once")]
    DuplicateEntry { vendor_id: u16, material_id: u16 },
}

/// Errors returned when parsing fake-tag fixtures and tag images.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FixtureError {
    #[error("fixture is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("tag UID must be {expected} bytes, got {actual}")]
    InvalidUidLength { expected: usize, actual: usize },
    #[error("tag memory must be a whole number of pages, got {len} bytes")]
    PartialPage { len: usize },
    #[error("tag memory holds at most {max} bytes, got {len}")]
    MemoryTooLarge { len: usize, max: usize },
    #[error("tag image is too small to hold a UID: {len} bytes")]
    ImageTooSmall { len: usize },
}

/// Errors returned by file-backed tag images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to access tag image `{}`", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("tag image `{}` is malformed", path.display())]
    Malformed { path: PathBuf, source: FixtureError },
}

/// Errors returned when opening the selected tag backend.
#[derive(Debug, Error)]
pub(crate) enum BackendError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("fake tag settings are invalid")]
    Fixture(#[from] FixtureError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("this command needs a tag; pass --image <path> or --fake")]
    MissingTransport,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum SpoolTagError {
    #[error(transparent)]
    #[from(SessionError, Box<SessionError>)]
    Session(Box<SessionError>),
    #[error(transparent)]
    #[from(DecodeError, Box<DecodeError>)]
    Decode(Box<DecodeError>),
    #[error(transparent)]
    #[from(InvalidField, Box<InvalidField>)]
    InvalidField(Box<InvalidField>),
    #[error(transparent)]
    #[from(CatalogError, Box<CatalogError>)]
    Catalog(Box<CatalogError>),
    #[error(transparent)]
    #[from(ImageError, Box<ImageError>)]
    Image(Box<ImageError>),
    #[error(transparent)]
    #[from(TransportError, Box<TransportError>)]
    Transport(Box<TransportError>),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn read_failure_reports_page_phase_and_cause() {
        let error = SessionError::ReadFailed {
            phase: SessionPhase::Verifying,
            page: 0x07,
            source: TransportError::NotPresent,
        };

        assert_eq!("failed to read page 0x07 while verifying", error.to_string());
        assert_eq!(
            Some("no tag is present on the reader".to_string()),
            error.source().map(ToString::to_string)
        );
    }

    #[test]
    fn presence_timeout_is_distinct_from_missing_tag() {
        let error = SessionError::PresenceFailed {
            phase: SessionPhase::Writing,
            source: TransportError::Timeout {
                timeout: Duration::from_secs(2),
            },
        };

        assert_eq!("tag presence check failed while writing", error.to_string());
        assert_eq!(
            Some("tag did not respond within 2s".to_string()),
            error.source().map(ToString::to_string)
        );
    }

    #[test]
    fn invalid_fake_tag_data_keeps_fixture_cause() {
        let error = BackendError::from(FixtureError::PartialPage { len: 2 });

        assert_eq!("fake tag settings are invalid", error.to_string());
        assert_eq!(
            Some("tag memory must be a whole number of pages, got 2 bytes".to_string()),
            error.source().map(ToString::to_string)
        );
    }

    #[test]
    fn timeout_renders_human_duration() {
        let error = TransportError::Timeout {
            timeout: Duration::from_millis(1500),
        };
        assert_eq!("tag did not respond within 1s 500ms", error.to_string());
    }

    #[test]
    fn top_level_error_boxes_session_errors() {
        let error: SpoolTagError = SessionError::NoTag {
            phase: SessionPhase::Reading,
        }
        .into();
        assert_eq!("no tag present while reading", error.to_string());
    }
}

use serde::Serialize;
use strum_macros::Display;

use crate::handlers::{RecordBlock, SpoolRecord};

/// Phase of a tag session, used to explain where an operation stopped.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[strum(to_string = "validating")]
    Validating,
    #[strum(to_string = "identifying")]
    Identifying,
    #[strum(to_string = "reading")]
    Reading,
    #[strum(to_string = "writing")]
    Writing,
    #[strum(to_string = "verifying")]
    Verifying,
}

/// Current state of a tag session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum SessionState {
    #[strum(to_string = "idle")]
    Idle,
    #[strum(to_string = "validating")]
    Validating,
    #[strum(to_string = "identifying")]
    Identifying,
    #[strum(to_string = "reading page {page}")]
    Reading { page: u8 },
    #[strum(to_string = "writing page {page}")]
    Writing { page: u8 },
    #[strum(to_string = "verifying page {page}")]
    Verifying { page: u8 },
    #[strum(to_string = "decoded")]
    Decoded,
    #[strum(to_string = "verified")]
    Verified,
    #[strum(to_string = "failed")]
    Failed,
    #[strum(to_string = "aborted")]
    Aborted,
}

/// How the serial field is chosen when writing a record.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialPolicy {
    /// Keep the serial carried by the record.
    #[default]
    #[strum(to_string = "preserve")]
    Preserve,
    /// Write an all-zero serial.
    #[strum(to_string = "reset")]
    Reset,
    /// Derive the serial from the tag UID.
    #[strum(to_string = "from_tag_uid")]
    FromTagUid,
}

/// Result of a verified record write.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WriteReceipt {
    record: SpoolRecord,
    block: RecordBlock,
    pages_written: usize,
    attempts: u8,
}

impl WriteReceipt {
    pub(crate) fn new(
        record: SpoolRecord,
        block: RecordBlock,
        pages_written: usize,
        attempts: u8,
    ) -> Self {
        Self {
            record,
            block,
            pages_written,
            attempts,
        }
    }

    /// The record as written, including the resolved serial.
    #[must_use]
    pub fn record(&self) -> &SpoolRecord {
        &self.record
    }

    /// The encoded block that was written and verified.
    #[must_use]
    pub fn block(&self) -> &RecordBlock {
        &self.block
    }

    /// Total page writes issued, across all attempts.
    #[must_use]
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Number of full write passes needed before verification succeeded.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }
}

use std::future::Future;
use std::time::Duration;

use bon::Builder;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, trace, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt as _;

use super::model::{SerialPolicy, SessionPhase, SessionState, WriteReceipt};
use super::transport::{TagPage, TagTransport};
use crate::error::{SessionError, TransportError};
use crate::handlers::{RecordBlock, SpoolCodec, SpoolRecord, SpoolSerial, TagContents};
use crate::protocol::{
    PAGE_SIZE, RECORD_BLOCK_LEN, RECORD_PAGE_COUNT, marker_page, page_for_offset, record_pages,
};

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_VERIFY_ATTEMPTS: u8 = 2;
/// Attempts per page operation before the session gives up.
const PAGE_ATTEMPTS: usize = 2;

/// Settings for one tag session.
#[derive(Debug, Clone, Builder)]
pub struct SessionConfig {
    /// Upper bound for any single transport call.
    #[builder(default = DEFAULT_PAGE_TIMEOUT)]
    page_timeout: Duration,
    /// Full write passes allowed before read-back verification gives up.
    #[builder(default = DEFAULT_VERIFY_ATTEMPTS)]
    verify_attempts: u8,
    #[builder(default)]
    cancellation: CancellationToken,
    #[builder(default = true)]
    beep_on_success: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }

    #[must_use]
    pub fn verify_attempts(&self) -> u8 {
        self.verify_attempts
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn beep_on_success(&self) -> bool {
        self.beep_on_success
    }
}

/// One read, inspect, or write run against a tag.
///
/// The session holds the transport exclusively for its lifetime, so page
/// operations are strictly sequential. Create a new session per operation.
///
/// ```
/// # async fn demo() -> Result<(), spooltag::SessionError> {
/// use spooltag::{FakeTag, SerialPolicy, SessionConfig, SpoolRecord, TagSession};
///
/// let mut tag = FakeTag::default();
/// let record = SpoolRecord::builder()
///     .vendor_id(0x0001)
///     .material_id(0x0005)
///     .total_length_mm(330_000)
///     .remaining_length_mm(330_000)
///     .build();
///
/// let mut session = TagSession::new(&mut tag, SessionConfig::default());
/// session.write_spool(record.clone(), SerialPolicy::Preserve).await?;
///
/// let mut session = TagSession::new(&mut tag, SessionConfig::default());
/// assert_eq!(record, session.read_spool().await?);
/// # Ok(())
/// # }
/// ```
pub struct TagSession<'a, T: TagTransport + ?Sized> {
    transport: &'a mut T,
    config: SessionConfig,
    state: SessionState,
}

impl<'a, T: TagTransport + ?Sized> TagSession<'a, T> {
    /// Creates an idle session over `transport`.
    pub fn new(transport: &'a mut T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Idle,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reads the raw record area without decoding it.
    ///
    /// # Errors
    ///
    /// Returns an error when no tag is present, a page read fails twice, or
    /// the session is cancelled.
    #[instrument(skip(self), level = "debug")]
    pub async fn read_block(&mut self) -> Result<RecordBlock, SessionError> {
        self.ensure_present(SessionPhase::Reading).await?;
        let bytes = self.read_record_area(SessionPhase::Reading).await?;
        Ok(RecordBlock::from(bytes))
    }

    /// Reads and decodes the spool record.
    ///
    /// # Errors
    ///
    /// Returns an error when the tag cannot be read or does not hold a valid
    /// spool record. Partial reads never produce a record.
    #[instrument(skip(self), level = "info", fields(progress = true))]
    pub async fn read_spool(&mut self) -> Result<SpoolRecord, SessionError> {
        start_progress("Reading spool tag", "Spool tag read");
        let block = self.read_block().await?;
        match SpoolCodec::decode(block.as_bytes()) {
            Ok(record) => {
                self.transition(SessionState::Decoded);
                Ok(record)
            }
            Err(error) => Err(self.fail(error.into())),
        }
    }

    /// Reads the record area and classifies its contents.
    ///
    /// # Errors
    ///
    /// Returns an error when the tag cannot be read or holds a corrupted
    /// spool record.
    #[instrument(skip(self), level = "info", fields(progress = true))]
    pub async fn inspect_spool(&mut self) -> Result<TagContents, SessionError> {
        start_progress("Inspecting spool tag", "Spool tag inspected");
        let block = self.read_block().await?;
        match SpoolCodec::inspect(block.as_bytes()) {
            Ok(contents) => {
                self.transition(SessionState::Decoded);
                Ok(contents)
            }
            Err(error) => Err(self.fail(error.into())),
        }
    }

    /// Writes `record` to the tag and verifies it by reading it back.
    ///
    /// Each pass first clears the marker page, then writes the block pages in
    /// ascending order, so the magic marker and checksum land last. A pass
    /// torn at any page leaves a block without the marker, never a mix of
    /// old and new fields that decodes. A mismatching read-back causes a full
    /// rewrite, up to the configured number of attempts. The receipt counts
    /// block pages only.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRecord`] before any tag I/O when the
    /// record is out of domain, and transport, verification, or cancellation
    /// errors otherwise. A failed write leaves the tag in whatever state the
    /// last successful page write produced.
    #[instrument(
        skip(self, record),
        level = "info",
        fields(progress = true, %serial_policy, vendor_id = record.vendor_id(), material_id = record.material_id())
    )]
    pub async fn write_spool(
        &mut self,
        record: SpoolRecord,
        serial_policy: SerialPolicy,
    ) -> Result<WriteReceipt, SessionError> {
        let span = start_progress("Writing spool tag", "Spool tag written");

        self.transition(SessionState::Validating);
        if let Err(error) = record.validate() {
            return Err(self.fail(SessionError::InvalidRecord(error)));
        }
        self.ensure_present(SessionPhase::Writing).await?;
        let record = self.resolve_serial(record, serial_policy).await?;
        let block = match SpoolCodec::encode(&record) {
            Ok(block) => block,
            Err(error) => return Err(self.fail(SessionError::InvalidRecord(error))),
        };

        let pass_len = (RECORD_PAGE_COUNT * 2) as u64;
        span.pb_set_length(pass_len);

        let allowed_attempts = self.config.verify_attempts.max(1);
        let mut pages_written = 0usize;
        let mut attempt = 1u8;
        loop {
            self.write_page(marker_page(), [0; PAGE_SIZE]).await?;
            for (page, data) in block.pages() {
                self.write_page(page, data).await?;
                pages_written += 1;
                span.pb_inc(1);
            }

            let read_back = self.read_record_area(SessionPhase::Verifying).await?;
            span.pb_inc(RECORD_PAGE_COUNT as u64);

            match first_mismatched_page(block.as_bytes(), &read_back) {
                None => break,
                Some(page) if attempt < allowed_attempts => {
                    warn!(page, attempt, "read-back differs from written record, rewriting");
                    attempt += 1;
                    span.pb_inc_length(pass_len);
                }
                Some(page) => {
                    return Err(self.fail(SessionError::WriteVerifyFailed {
                        attempts: attempt,
                        page,
                    }));
                }
            }
        }

        self.transition(SessionState::Verified);
        info!(pages_written, attempts = attempt, "spool record written and verified");

        if self.config.beep_on_success {
            let limit = self.config.page_timeout;
            if let Err(error) = within(limit, self.transport.beep()).await {
                warn!(%error, "reader did not acknowledge the completion beep");
            }
        }

        Ok(WriteReceipt::new(record, block, pages_written, attempt))
    }

    async fn resolve_serial(
        &mut self,
        record: SpoolRecord,
        serial_policy: SerialPolicy,
    ) -> Result<SpoolRecord, SessionError> {
        match serial_policy {
            SerialPolicy::Preserve => Ok(record),
            SerialPolicy::Reset => Ok(record.with_serial(SpoolSerial::ZERO)),
            SerialPolicy::FromTagUid => {
                self.transition(SessionState::Identifying);
                let limit = self.config.page_timeout;
                match within(limit, self.transport.uid()).await {
                    Ok(uid) => {
                        let serial = SpoolSerial::from_uid(&uid);
                        debug!(%serial, "derived serial from tag UID");
                        Ok(record.with_serial(serial))
                    }
                    Err(source) => Err(self.fail(SessionError::IdentifyFailed { source })),
                }
            }
        }
    }

    async fn ensure_present(&mut self, phase: SessionPhase) -> Result<(), SessionError> {
        let limit = self.config.page_timeout;
        match timeout(limit, self.transport.present()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.fail(SessionError::NoTag { phase })),
            Err(_elapsed) => Err(self.fail(SessionError::PresenceFailed {
                phase,
                source: TransportError::Timeout { timeout: limit },
            })),
        }
    }

    async fn read_record_area(
        &mut self,
        phase: SessionPhase,
    ) -> Result<[u8; RECORD_BLOCK_LEN], SessionError> {
        let mut bytes = [0u8; RECORD_BLOCK_LEN];
        for (page, chunk) in record_pages().zip(bytes.chunks_exact_mut(PAGE_SIZE)) {
            let data = self.read_page(phase, page).await?;
            chunk.copy_from_slice(&data);
        }
        Ok(bytes)
    }

    async fn read_page(&mut self, phase: SessionPhase, page: u8) -> Result<TagPage, SessionError> {
        self.check_cancelled(phase, page)?;
        self.transition(page_state(phase, page));

        let limit = self.config.page_timeout;
        let mut attempt = 1;
        loop {
            match within(limit, self.transport.read_page(page)).await {
                Ok(data) => {
                    trace!(page, attempt, "page read");
                    return Ok(data);
                }
                Err(source) if attempt < PAGE_ATTEMPTS => {
                    debug!(page, attempt, %source, "page read failed, retrying");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(self.fail(SessionError::ReadFailed {
                        phase,
                        page,
                        source,
                    }));
                }
            }
        }
    }

    async fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), SessionError> {
        self.check_cancelled(SessionPhase::Writing, page)?;
        self.transition(SessionState::Writing { page });

        let limit = self.config.page_timeout;
        let mut attempt = 1;
        loop {
            match within(limit, self.transport.write_page(page, data)).await {
                Ok(()) => {
                    trace!(page, attempt, "page written");
                    return Ok(());
                }
                Err(source) if attempt < PAGE_ATTEMPTS => {
                    debug!(page, attempt, %source, "page write failed, retrying");
                    attempt += 1;
                }
                Err(source) => return Err(self.fail(SessionError::WriteFailed { page, source })),
            }
        }
    }

    fn check_cancelled(&mut self, phase: SessionPhase, page: u8) -> Result<(), SessionError> {
        if !self.config.cancellation.is_cancelled() {
            return Ok(());
        }
        debug!(%phase, page, "session cancelled");
        self.transition(SessionState::Aborted);
        Err(SessionError::Aborted { phase, page })
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state changed");
            self.state = next;
        }
    }

    fn fail(&mut self, error: SessionError) -> SessionError {
        self.transition(SessionState::Failed);
        error
    }
}

fn start_progress(message: &'static str, finished: &'static str) -> Span {
    let span = Span::current();
    span.pb_set_message(message);
    span.pb_set_finish_message(finished);
    span
}

async fn within<V>(
    limit: Duration,
    operation: impl Future<Output = Result<V, TransportError>>,
) -> Result<V, TransportError> {
    timeout(limit, operation)
        .await
        .unwrap_or_else(|_elapsed| Err(TransportError::Timeout { timeout: limit }))
}

fn page_state(phase: SessionPhase, page: u8) -> SessionState {
    match phase {
        SessionPhase::Validating => SessionState::Validating,
        SessionPhase::Identifying => SessionState::Identifying,
        SessionPhase::Reading => SessionState::Reading { page },
        SessionPhase::Writing => SessionState::Writing { page },
        SessionPhase::Verifying => SessionState::Verifying { page },
    }
}

fn first_mismatched_page(expected: &[u8], actual: &[u8]) -> Option<u8> {
    expected
        .iter()
        .zip(actual)
        .position(|(left, right)| left != right)
        .map(page_for_offset)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hw::{FakeFault, FakeTag, FakeTagConfig, TagOperation};

    fn record() -> SpoolRecord {
        SpoolRecord::builder()
            .vendor_id(0x0002)
            .material_id(0x0002)
            .colour(0x00FF_6600)
            .diameter_microns(1750)
            .total_length_mm(250_000)
            .remaining_length_mm(120_500)
            .build()
    }

    #[tokio::test]
    async fn read_of_blank_tag_is_not_vendor_format() {
        let mut tag = FakeTag::default();
        let mut session = TagSession::new(&mut tag, SessionConfig::default());

        let result = session.read_spool().await;

        assert_matches!(
            result,
            Err(SessionError::DecodeFailed(crate::handlers::DecodeError::NotVendorFormat))
        );
        assert_eq!(SessionState::Failed, session.state());
    }

    #[tokio::test]
    async fn write_walks_pages_in_ascending_order_then_verifies() {
        let mut tag = FakeTag::default();
        let mut session = TagSession::new(&mut tag, SessionConfig::default());

        let receipt = session
            .write_spool(record(), SerialPolicy::Preserve)
            .await
            .expect("write should succeed");
        assert_eq!(SessionState::Verified, session.state());
        assert_eq!(RECORD_PAGE_COUNT, receipt.pages_written());
        assert_eq!(1, receipt.attempts());

        let expected_pages: Vec<u8> = std::iter::once(marker_page())
            .chain(record_pages())
            .collect();
        assert_eq!(expected_pages, tag.written_pages());
        assert_eq!(Some(&TagOperation::Beep), tag.operations().last());
    }

    #[tokio::test]
    async fn invalid_record_is_rejected_before_any_io() {
        let mut tag = FakeTag::default();
        let mut session = TagSession::new(&mut tag, SessionConfig::default());
        let bad = record().with_remaining_length_mm(400_000);

        let result = session.write_spool(bad, SerialPolicy::Preserve).await;

        assert_matches!(result, Err(SessionError::InvalidRecord(_)));
        assert!(tag.operations().is_empty());
    }

    #[tokio::test]
    async fn cancelled_session_aborts_before_marker_page() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let mut tag = FakeTag::default();
        let config = SessionConfig::builder().cancellation(cancellation).build();
        let mut session = TagSession::new(&mut tag, config);

        let result = session.write_spool(record(), SerialPolicy::Preserve).await;

        assert_eq!(
            Err(SessionError::Aborted {
                phase: SessionPhase::Writing,
                page: 15,
            }),
            result.map(|_| ())
        );
        assert_eq!(SessionState::Aborted, session.state());
        assert!(tag.written_pages().is_empty());
    }

    #[tokio::test]
    async fn beep_can_be_disabled() {
        let mut tag = FakeTag::default();
        let config = SessionConfig::builder().beep_on_success(false).build();
        let mut session = TagSession::new(&mut tag, config);

        session
            .write_spool(record(), SerialPolicy::Preserve)
            .await
            .expect("write should succeed");

        assert!(!tag.operations().contains(&TagOperation::Beep));
    }

    #[tokio::test]
    async fn second_read_failure_on_same_page_fails_with_page_index() {
        let mut tag = FakeTag::new(
            FakeTagConfig::builder()
                .faults(vec![FakeFault::ReadError { page: 9, times: 2 }])
                .build(),
        )
        .expect("fake tag without user data");
        let mut session = TagSession::new(&mut tag, SessionConfig::default());

        let result = session.read_block().await;

        assert_matches!(
            result,
            Err(SessionError::ReadFailed {
                phase: SessionPhase::Reading,
                page: 9,
                source: TransportError::Io { .. },
            })
        );
    }

    #[test]
    fn mismatch_reports_page_of_first_differing_byte() {
        let expected = [0u8; RECORD_BLOCK_LEN];
        let mut actual = expected;
        actual[21] = 1;

        assert_eq!(Some(9), first_mismatched_page(&expected, &actual));
        assert_eq!(None, first_mismatched_page(&expected, &expected));
    }
}

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::time::sleep;
use tracing::trace;

use super::memory::{DEFAULT_UID, TagMemory, UID_LEN, parse_uid};
use super::transport::{TagPage, TagTransport};
use crate::error::{FixtureError, TransportError};

/// Parsed fake tag UID.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Into)]
pub struct UidFixture {
    uid: [u8; UID_LEN],
}

impl FromStr for UidFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            uid: parse_uid(value)?,
        })
    }
}

/// Parsed fake user-memory contents, starting at the first user page.
#[derive(Debug, Clone, Eq, PartialEq, derive_more::Into)]
pub struct UserDataFixture {
    bytes: Vec<u8>,
}

impl FromStr for UserDataFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Self {
            bytes: hex::decode(cleaned)?,
        })
    }
}

/// A failure injected into the fake tag.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FakeFault {
    /// Reads of `page` fail with an I/O error `times` times.
    ReadError { page: u8, times: usize },
    /// Writes to `page` fail with an I/O error `times` times.
    WriteError { page: u8, times: usize },
    /// Writes to `page` report success but store inverted bytes `times` times.
    CorruptWrite { page: u8, times: usize },
    /// The tag leaves the field after `writes` successful page writes.
    RemoveAfterWrites { writes: usize },
}

/// One operation observed by the fake tag.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TagOperation {
    Read(u8),
    Write(u8),
    Uid,
    Beep,
}

/// Settings for constructing a fake tag.
#[derive(Debug, Clone, Builder)]
pub struct FakeTagConfig {
    #[builder(default = DEFAULT_UID)]
    uid: [u8; UID_LEN],
    user_data: Option<Vec<u8>>,
    #[builder(default)]
    faults: Vec<FakeFault>,
    /// Artificial latency for every tag operation.
    #[builder(default)]
    operation_delay: Duration,
    #[builder(default = true)]
    present: bool,
}

impl Default for FakeTagConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// In-memory NTAG216 used in tests and non-hardware runs.
#[derive(Debug)]
pub struct FakeTag {
    memory: TagMemory,
    faults: Vec<FakeFault>,
    operation_delay: Duration,
    present: bool,
    successful_writes: usize,
    operations: Vec<TagOperation>,
}

/// A present, blank tag with the default UID and no faults.
impl Default for FakeTag {
    fn default() -> Self {
        Self::with_memory(TagMemory::blank(DEFAULT_UID))
    }
}

impl FakeTag {
    /// Creates a fake tag from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured user data is not a whole number of
    /// pages or does not fit in tag memory.
    pub fn new(config: FakeTagConfig) -> Result<Self, FixtureError> {
        let FakeTagConfig {
            uid,
            user_data,
            faults,
            operation_delay,
            present,
        } = config;
        let memory = match user_data {
            Some(user_data) => TagMemory::with_user_data(uid, &user_data)?,
            None => TagMemory::blank(uid),
        };

        Ok(Self {
            memory,
            faults,
            operation_delay,
            present,
            successful_writes: 0,
            operations: Vec::new(),
        })
    }

    /// Creates a fake tag from existing memory.
    #[must_use]
    pub fn with_memory(memory: TagMemory) -> Self {
        Self {
            memory,
            faults: Vec::new(),
            operation_delay: Duration::ZERO,
            present: true,
            successful_writes: 0,
            operations: Vec::new(),
        }
    }

    /// Returns the current tag memory.
    #[must_use]
    pub fn memory(&self) -> &TagMemory {
        &self.memory
    }

    /// Returns every operation the tag has received, in order.
    #[must_use]
    pub fn operations(&self) -> &[TagOperation] {
        &self.operations
    }

    /// Returns the pages written so far, in order.
    #[must_use]
    pub fn written_pages(&self) -> Vec<u8> {
        self.operations
            .iter()
            .filter_map(|operation| match operation {
                TagOperation::Write(page) => Some(*page),
                _ => None,
            })
            .collect()
    }

    /// Places the tag back in, or takes it out of, the reader field.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Adds a fault to the tag.
    pub fn inject(&mut self, fault: FakeFault) {
        self.faults.push(fault);
    }

    /// Clears the operation log.
    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    async fn delay(&self) {
        if !self.operation_delay.is_zero() {
            sleep(self.operation_delay).await;
        }
    }

    fn ensure_present(&self) -> Result<(), TransportError> {
        if self.present {
            Ok(())
        } else {
            Err(TransportError::NotPresent)
        }
    }

    /// Consumes one matching fault occurrence, if any.
    fn take_fault(&mut self, matches: impl Fn(&FakeFault) -> bool) -> Option<FakeFault> {
        let fault = self
            .faults
            .iter_mut()
            .find(|fault| matches(&**fault) && remaining_occurrences(fault) > 0)?;
        let observed = *fault;
        if let FakeFault::ReadError { times, .. }
        | FakeFault::WriteError { times, .. }
        | FakeFault::CorruptWrite { times, .. } = fault
        {
            *times -= 1;
        }
        self.faults
            .retain(|fault| remaining_occurrences(fault) > 0);
        Some(observed)
    }

    fn removal_due(&self) -> bool {
        self.faults.iter().any(|fault| {
            matches!(fault, FakeFault::RemoveAfterWrites { writes } if self.successful_writes >= *writes)
        })
    }
}

fn remaining_occurrences(fault: &FakeFault) -> usize {
    match fault {
        FakeFault::ReadError { times, .. }
        | FakeFault::WriteError { times, .. }
        | FakeFault::CorruptWrite { times, .. } => *times,
        FakeFault::RemoveAfterWrites { .. } => usize::MAX,
    }
}

#[async_trait]
impl TagTransport for FakeTag {
    async fn present(&mut self) -> bool {
        self.present
    }

    async fn read_page(&mut self, page: u8) -> Result<TagPage, TransportError> {
        self.delay().await;
        self.operations.push(TagOperation::Read(page));
        self.ensure_present()?;
        let read_fault = self.take_fault(|fault| {
            matches!(fault, FakeFault::ReadError { page: target, .. } if *target == page)
        });
        if read_fault.is_some() {
            trace!(page, "injecting fake read failure");
            return Err(TransportError::Io {
                detail: format!("injected read failure on page {page}"),
            });
        }
        self.memory.read_page(page)
    }

    async fn write_page(&mut self, page: u8, data: TagPage) -> Result<(), TransportError> {
        self.delay().await;
        self.operations.push(TagOperation::Write(page));
        if self.removal_due() {
            self.present = false;
        }
        self.ensure_present()?;
        let write_fault = self.take_fault(|fault| {
            matches!(fault, FakeFault::WriteError { page: target, .. } if *target == page)
        });
        if write_fault.is_some() {
            trace!(page, "injecting fake write failure");
            return Err(TransportError::Io {
                detail: format!("injected write failure on page {page}"),
            });
        }

        let corrupt_fault = self.take_fault(|fault| {
            matches!(fault, FakeFault::CorruptWrite { page: target, .. } if *target == page)
        });
        let stored = if corrupt_fault.is_some() {
            trace!(page, "injecting fake write corruption");
            data.map(|byte| !byte)
        } else {
            data
        };
        self.memory.write_page(page, stored)?;
        self.successful_writes += 1;
        Ok(())
    }

    async fn uid(&mut self) -> Result<Vec<u8>, TransportError> {
        self.delay().await;
        self.operations.push(TagOperation::Uid);
        self.ensure_present()?;
        Ok(self.memory.uid().to_vec())
    }

    async fn beep(&mut self) -> Result<(), TransportError> {
        self.operations.push(TagOperation::Beep);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn fake_with(fault: FakeFault) -> FakeTag {
        FakeTag::new(FakeTagConfig::builder().faults(vec![fault]).build())
            .expect("fake tag without user data")
    }

    #[tokio::test]
    async fn read_fault_fires_the_configured_number_of_times() {
        let mut tag = fake_with(FakeFault::ReadError { page: 4, times: 2 });

        assert_matches!(tag.read_page(4).await, Err(TransportError::Io { .. }));
        assert_matches!(tag.read_page(4).await, Err(TransportError::Io { .. }));
        assert_eq!(Ok([0; 4]), tag.read_page(4).await);
    }

    #[tokio::test]
    async fn corrupt_write_stores_inverted_bytes() {
        let mut tag = fake_with(FakeFault::CorruptWrite { page: 5, times: 1 });

        tag.write_page(5, [0x0F; 4])
            .await
            .expect("corrupted write still reports success");
        assert_eq!(Ok([0xF0; 4]), tag.read_page(5).await);
    }

    #[tokio::test]
    async fn tag_disappears_after_configured_writes() {
        let mut tag = fake_with(FakeFault::RemoveAfterWrites { writes: 1 });

        tag.write_page(4, [1; 4]).await.expect("first write succeeds");
        assert_eq!(Err(TransportError::NotPresent), tag.write_page(5, [1; 4]).await);
        assert!(!tag.present().await);
        assert_eq!(vec![4, 5], tag.written_pages());
    }

    #[tokio::test]
    async fn user_data_is_loaded_from_the_first_user_page() {
        let config = FakeTagConfig::builder()
            .user_data(vec![0xAA, 0xBB, 0xCC, 0xDD])
            .build();
        let mut tag = FakeTag::new(config).expect("one whole page");

        assert_eq!(Ok([0xAA, 0xBB, 0xCC, 0xDD]), tag.read_page(4).await);
    }

    #[rstest]
    #[case::partial_page(vec![0x01, 0x02], FixtureError::PartialPage { len: 2 })]
    #[case::oversized(vec![0; 1024], FixtureError::MemoryTooLarge { len: 1024, max: 908 })]
    fn unusable_user_data_is_rejected(#[case] user_data: Vec<u8>, #[case] expected: FixtureError) {
        let config = FakeTagConfig::builder().user_data(user_data).build();

        assert_eq!(Some(expected), FakeTag::new(config).err());
    }

    #[test]
    fn user_data_fixture_parses_hex() {
        let fixture: UserDataFixture = "DEAD BEEF".parse().expect("hex should parse");
        assert_eq!(vec![0xDE, 0xAD, 0xBE, 0xEF], Vec::<u8>::from(fixture));
    }

    #[test]
    fn uid_fixture_requires_seven_bytes() {
        let result = "0102".parse::<UidFixture>();
        assert_matches!(result, Err(FixtureError::InvalidUidLength { actual: 2, .. }));
    }
}

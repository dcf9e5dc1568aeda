mod apdu;
mod fake_backend;
mod image_backend;
mod memory;
mod model;
mod session;
mod transport;

pub use self::apdu::{ApduResponse, ApduTransport, CardChannel};
pub use self::fake_backend::{
    FakeFault, FakeTag, FakeTagConfig, TagOperation, UidFixture, UserDataFixture,
};
pub use self::image_backend::ImageTag;
pub use self::memory::{DEFAULT_UID, NTAG216_PAGES, TagMemory, UID_LEN, parse_uid};
pub use self::model::{SerialPolicy, SessionPhase, SessionState, WriteReceipt};
pub use self::session::{SessionConfig, TagSession};
pub use self::transport::{TagPage, TagTransport};
pub(crate) use self::transport::{TagBackend, tag_transport_from_backend};

mod app;
mod catalog;
mod cli;
mod error;
mod handlers;
mod hw;
mod protocol;
mod telemetry;
mod terminal;
mod utils;

pub use app::{run, run_with_clients};
pub use catalog::{MaterialCatalog, MaterialDefinition};
pub use cli::{
    Args, Backend, Command, DecodeArgs, DiameterArg, EncodeArgs, FakeArgs, InitImageArgs,
    LogLevel, OutputFormat, RecordArgs, RunOptions, SerialPolicyArg, WriteArgs,
};
pub use error::{
    CatalogError, FixtureError, ImageError, SessionError, SpoolTagError, TransportError,
};
pub use handlers::{
    Checksum, DEFAULT_STATION_ID, DecodeError, Diameter, InvalidField, KnownVendor,
    MaterialFamily, RecordBlock, Rgb, SERIAL_LEN, SerialParseError, SpoolCodec, SpoolRecord,
    SpoolSerial, TagContents, Vendor, length_mm_from_meters,
};
pub use hw::{
    ApduResponse, ApduTransport, CardChannel, DEFAULT_UID, FakeFault, FakeTag, FakeTagConfig,
    ImageTag, NTAG216_PAGES, SerialPolicy, SessionConfig, SessionPhase, SessionState,
    TagMemory, TagOperation, TagPage, TagSession, TagTransport, UID_LEN, UidFixture,
    UserDataFixture, WriteReceipt, parse_uid,
};
pub use protocol::{
    COMPATIBILITY_VERSION, FORMAT_VERSION, MAGIC, PAGE_SIZE, RECORD_BLOCK_LEN, RECORD_PAGE_COUNT,
    RECORD_START_PAGE, marker_page, record_pages,
};
pub use terminal::{SystemTerminalClient, TerminalClient};

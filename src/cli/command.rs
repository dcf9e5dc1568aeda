use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::error::{CliConfigError, FixtureError};
use crate::handlers::{InvalidField, SpoolRecord, SpoolSerial, length_mm_from_meters};
use crate::hw::{FakeTagConfig, SerialPolicy, TagBackend, UidFixture, UserDataFixture};

/// Command-line options for the spool tag tool.
#[derive(Debug, Parser)]
#[command(name = "spooltag", about = "Read and write filament spool NFC tags.")]
pub struct Args {
    /// Log level, overriding `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Per-page tag timeout (e.g. `500ms`, `2s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    timeout: Option<Duration>,
    /// Material catalog JSON file.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Uses a tag image file instead of a reader.
    #[arg(long, global = true, conflicts_with = "fake")]
    image: Option<PathBuf>,
    /// Uses an in-memory fake tag.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake tag user memory from page 4, as hexadecimal bytes.
    #[arg(long, global = true, requires = "fake")]
    fake_tag: Option<UserDataFixture>,
    /// Fake tag UID as 7 hexadecimal bytes.
    #[arg(long, global = true, requires = "fake")]
    fake_uid: Option<UidFixture>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use spooltag::{Args, Command};
    ///
    /// let args = Args::new(Command::Catalog);
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output: None,
            timeout: None,
            catalog: None,
            image: None,
            fake: false,
            fake_tag: None,
            fake_uid: None,
            command,
        }
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Splits parsed arguments into the command and its run options.
    #[must_use]
    pub fn into_command_and_options(self) -> (Command, RunOptions) {
        let Args {
            log_level,
            output,
            timeout,
            catalog,
            image,
            fake,
            fake_tag,
            fake_uid,
            command,
        } = self;

        let backend = match (image, fake) {
            (Some(path), _) => Some(Backend::Image(path)),
            (None, true) => Some(Backend::Fake(FakeArgs {
                uid: fake_uid,
                user_data: fake_tag,
                operation_delay: Duration::ZERO,
            })),
            (None, false) => None,
        };

        let options = RunOptions::builder()
            .maybe_output_format(output)
            .maybe_log_level(log_level)
            .maybe_page_timeout(timeout)
            .maybe_catalog_path(catalog)
            .maybe_backend(backend)
            .build();
        (command, options)
    }
}

/// Options shared by every command run.
#[derive(Debug, Clone, Default, Builder)]
pub struct RunOptions {
    output_format: Option<OutputFormat>,
    log_level: Option<LogLevel>,
    page_timeout: Option<Duration>,
    catalog_path: Option<PathBuf>,
    backend: Option<Backend>,
}

impl RunOptions {
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout
    }

    #[must_use]
    pub fn catalog_path(&self) -> Option<&PathBuf> {
        self.catalog_path.as_ref()
    }

    pub(crate) fn tag_backend(&self) -> Result<TagBackend, CliConfigError> {
        match &self.backend {
            Some(Backend::Image(path)) => Ok(TagBackend::Image(path.clone())),
            Some(Backend::Fake(fake)) => Ok(TagBackend::Fake(fake.clone().into_tag_config())),
            None => Err(CliConfigError::MissingTransport),
        }
    }
}

/// Tag backend chosen on the command line.
#[derive(Debug, Clone)]
pub enum Backend {
    /// A tag image file holding a full memory dump.
    Image(PathBuf),
    /// An in-memory fake tag.
    Fake(FakeArgs),
}

/// Fake tag arguments for programmatic runs.
#[derive(Debug, Clone, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    uid: Option<UidFixture>,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    user_data: Option<UserDataFixture>,
    #[builder(default)]
    operation_delay: Duration,
}

impl FakeArgs {
    pub(crate) fn into_tag_config(self) -> FakeTagConfig {
        let Self {
            uid,
            user_data,
            operation_delay,
        } = self;

        let config = FakeTagConfig::builder()
            .maybe_user_data(user_data.map(Vec::from))
            .operation_delay(operation_delay);
        match uid {
            Some(uid) => config.uid(uid.into()).build(),
            None => config.build(),
        }
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read the tag and print its spool record, or whether it is blank or foreign.
    Read,
    /// Write a spool record to the tag and verify it by reading it back.
    Write(WriteArgs),
    /// Encode a spool record into a block file.
    Encode(EncodeArgs),
    /// Decode a block file.
    Decode(DecodeArgs),
    /// List the material catalog.
    Catalog,
    /// Create a blank NTAG216 tag image file.
    InitImage(InitImageArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write(_) => "write",
            Self::Encode(_) => "encode",
            Self::Decode(_) => "decode",
            Self::Catalog => "catalog",
            Self::InitImage(_) => "init-image",
        }
    }
}

/// Spool record fields given on the command line.
#[derive(Debug, Clone, ClapArgs)]
pub struct RecordArgs {
    /// Vendor id (decimal or `0x`-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    vendor: u16,
    /// Material id within the vendor namespace.
    #[arg(long, value_parser = parse_u16)]
    material: u16,
    /// Colour as `#RRGGBB`.
    #[arg(long, value_parser = parse_colour, default_value = "#FFFFFF")]
    colour: u32,
    /// Filament diameter in millimetres.
    #[arg(long, value_enum, default_value_t = DiameterArg::Large)]
    diameter: DiameterArg,
    /// Total filament length in metres.
    #[arg(long)]
    total: f64,
    /// Remaining filament length in metres; defaults to the total.
    #[arg(long)]
    remaining: Option<f64>,
    /// Spool serial as up to 8 hexadecimal bytes.
    #[arg(long)]
    serial: Option<SpoolSerial>,
    /// Manufacturing time as unix seconds; defaults to now.
    #[arg(long)]
    manufactured_at: Option<u64>,
    /// Accumulated usage (e.g. `3h`).
    #[arg(long, value_parser = parse_duration)]
    usage: Option<Duration>,
    /// Programming station id.
    #[arg(long, value_parser = parse_u16)]
    station: Option<u16>,
}

impl RecordArgs {
    /// Builds the spool record these arguments describe.
    pub(crate) fn to_record(&self, now_unix: u64) -> Result<SpoolRecord, InvalidField> {
        let total_length_mm = length_mm_from_meters(self.total)?;
        let remaining_length_mm = match self.remaining {
            Some(remaining) => length_mm_from_meters(remaining)?,
            None => total_length_mm,
        };
        let usage_seconds = self
            .usage
            .map_or(0, |usage| u32::try_from(usage.as_secs()).unwrap_or(u32::MAX));

        let record = SpoolRecord::builder()
            .vendor_id(self.vendor)
            .material_id(self.material)
            .colour(self.colour)
            .diameter_microns(self.diameter.microns())
            .total_length_mm(total_length_mm)
            .remaining_length_mm(remaining_length_mm)
            .serial(self.serial.unwrap_or_default())
            .manufactured_at(self.manufactured_at.unwrap_or(now_unix))
            .usage_seconds(usage_seconds)
            .maybe_station_id(self.station)
            .build();
        record.validate()?;
        Ok(record)
    }

    pub(crate) fn has_serial(&self) -> bool {
        self.serial.is_some()
    }
}

/// Arguments for `write`.
#[derive(Debug, Clone, ClapArgs)]
pub struct WriteArgs {
    #[command(flatten)]
    record: RecordArgs,
    /// How to choose the serial; defaults to `preserve` with `--serial`, else `from-tag-uid`.
    #[arg(long, value_enum)]
    serial_policy: Option<SerialPolicyArg>,
}

impl WriteArgs {
    pub(crate) fn record(&self) -> &RecordArgs {
        &self.record
    }

    pub(crate) fn serial_policy(&self) -> SerialPolicy {
        match self.serial_policy {
            Some(policy) => policy.into(),
            None if self.record.has_serial() => SerialPolicy::Preserve,
            None => SerialPolicy::FromTagUid,
        }
    }
}

/// Arguments for `encode`.
#[derive(Debug, Clone, ClapArgs)]
pub struct EncodeArgs {
    /// Output block file.
    path: PathBuf,
    #[command(flatten)]
    record: RecordArgs,
}

impl EncodeArgs {
    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn record(&self) -> &RecordArgs {
        &self.record
    }
}

/// Arguments for `decode`.
#[derive(Debug, Clone, ClapArgs)]
pub struct DecodeArgs {
    /// Block file to decode.
    path: PathBuf,
}

impl DecodeArgs {
    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Arguments for `init-image`.
#[derive(Debug, Clone, ClapArgs)]
pub struct InitImageArgs {
    /// Image file to create.
    path: PathBuf,
    /// Tag UID as 7 hexadecimal bytes.
    #[arg(long)]
    uid: Option<UidFixture>,
}

impl InitImageArgs {
    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn uid(&self) -> Option<UidFixture> {
        self.uid
    }
}

/// Output rendering mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Nominal filament diameter accepted by `--diameter`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum DiameterArg {
    #[value(name = "1.75")]
    Standard,
    #[value(name = "2.85")]
    Large,
}

impl DiameterArg {
    fn microns(self) -> u16 {
        match self {
            Self::Standard => 1750,
            Self::Large => 2850,
        }
    }
}

/// Serial policy accepted by `--serial-policy`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum SerialPolicyArg {
    Preserve,
    Reset,
    FromTagUid,
}

impl From<SerialPolicyArg> for SerialPolicy {
    fn from(value: SerialPolicyArg) -> Self {
        match value {
            SerialPolicyArg::Preserve => Self::Preserve,
            SerialPolicyArg::Reset => Self::Reset,
            SerialPolicyArg::FromTagUid => Self::FromTagUid,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

fn parse_u16(value: &str) -> Result<u16, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|error| error.to_string())
}

fn parse_colour(value: &str) -> Result<u32, String> {
    let digits = value
        .strip_prefix('#')
        .or_else(|| value.strip_prefix("0x"))
        .unwrap_or(value);
    if digits.len() != 6 {
        return Err(format!("expected six hex digits, got `{value}`"));
    }
    u32::from_str_radix(digits, 16).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn fake_fixture_flags_require_fake_mode() {
        let result = Args::try_parse_from(["spooltag", "--fake-uid", "04112233445566", "read"]);

        let error = result.expect_err("fake fixture flags should require --fake");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn image_and_fake_conflict() {
        let result = Args::try_parse_from(["spooltag", "--fake", "--image", "tag.bin", "read"]);

        let error = result.expect_err("backends should be exclusive");
        assert_eq!(ErrorKind::ArgumentConflict, error.kind());
    }

    #[test]
    fn fake_mode_builds_fake_backend() {
        let args = Args::try_parse_from(["spooltag", "--fake", "--timeout", "250ms", "read"])
            .expect("valid fake arguments should parse");

        let (command, options) = args.into_command_and_options();
        assert_matches!(command, Command::Read);
        assert_eq!(Some(Duration::from_millis(250)), options.page_timeout());
        assert_matches!(options.tag_backend(), Ok(TagBackend::Fake(_)));
    }

    #[test]
    fn missing_backend_is_reported_on_use() {
        let (_command, options) = Args::new(Command::Read).into_command_and_options();
        assert_matches!(options.tag_backend(), Err(CliConfigError::MissingTransport));
    }

    #[test]
    fn write_arguments_build_a_record() {
        let args = Args::try_parse_from([
            "spooltag",
            "write",
            "--vendor",
            "0x1A2B",
            "--material",
            "5",
            "--colour",
            "#00FF00",
            "--total",
            "500",
            "--remaining",
            "125.5",
            "--manufactured-at",
            "1700000000",
        ])
        .expect("write arguments should parse");

        let (Command::Write(write), _options) = args.into_command_and_options() else {
            panic!("expected write command");
        };
        let record = write
            .record()
            .to_record(0)
            .expect("record should be valid");
        assert_eq!(0x1A2B, record.vendor_id());
        assert_eq!(0x00_FF00, record.colour());
        assert_eq!(2850, record.diameter_microns());
        assert_eq!(125_500, record.remaining_length_mm());
        assert_eq!(1_700_000_000, record.manufactured_at_unix());
        assert_eq!(SerialPolicy::FromTagUid, write.serial_policy());
    }

    #[test]
    fn remaining_above_total_is_rejected() {
        let args = Args::try_parse_from([
            "spooltag", "encode", "out.bin", "--vendor", "1", "--material", "5", "--total", "10",
            "--remaining", "11",
        ])
        .expect("encode arguments should parse");

        let (Command::Encode(encode), _options) = args.into_command_and_options() else {
            panic!("expected encode command");
        };
        assert_matches!(
            encode.record().to_record(0),
            Err(InvalidField::RemainingExceedsTotal { .. })
        );
    }

    #[rstest]
    #[case("0x1A2B", Ok(0x1A2B))]
    #[case("42", Ok(42))]
    #[case("0x10000", Err(()))]
    fn u16_parser_accepts_hex_and_decimal(#[case] input: &str, #[case] expected: Result<u16, ()>) {
        assert_eq!(expected, parse_u16(input).map_err(|_| ()));
    }

    #[rstest]
    #[case("#00FF00", Ok(0x00FF00))]
    #[case("ff6600", Ok(0xFF6600))]
    #[case("#FFF", Err(()))]
    fn colour_parser_requires_six_digits(#[case] input: &str, #[case] expected: Result<u32, ()>) {
        assert_eq!(expected, parse_colour(input).map_err(|_| ()));
    }
}

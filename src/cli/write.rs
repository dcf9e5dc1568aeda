use std::io;

use anyhow::Result;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::catalog::{MaterialCatalog, MaterialDefinition};
use crate::cli::{OutputFormat, WriteArgs};
use crate::handlers::SpoolRecord;
use crate::hw::{SerialPolicy, SessionConfig, TagSession, TagTransport};
use crate::terminal::TerminalClient;

use super::ui::{Painter, SpoolRecordView};

#[derive(Debug, Serialize)]
struct WriteReport<'a> {
    record: &'a SpoolRecord,
    material: Option<&'a MaterialDefinition>,
    serial_policy: SerialPolicy,
    pages_written: usize,
    attempts: u8,
    checksum: String,
}

/// Executes the `write` command.
#[instrument(skip_all, level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    transport: &mut dyn TagTransport,
    session_config: SessionConfig,
    args: &WriteArgs,
    catalog: &MaterialCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let record = args.record().to_record(now_unix())?;
    let serial_policy = args.serial_policy();

    let mut session = TagSession::new(transport, session_config);
    let receipt = session.write_spool(record, serial_policy).await?;

    let report = WriteReport {
        record: receipt.record(),
        material: catalog.lookup_record(receipt.record()).ok(),
        serial_policy,
        pages_written: receipt.pages_written(),
        attempts: receipt.attempts(),
        checksum: format!("{:#04X}", receipt.block().checksum()),
    };

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{} ({} pages, {} attempt(s), checksum {})",
                painter.done("✓ Spool tag written and verified"),
                report.pages_written,
                report.attempts,
                report.checksum
            )?;
            writeln!(
                out,
                "{}",
                SpoolRecordView::new(report.record, report.material, &painter)
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

pub(crate) fn now_unix() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or_default()
}

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::catalog::MaterialCatalog;
use crate::cli::{DecodeArgs, EncodeArgs, OutputFormat};
use crate::handlers::SpoolCodec;
use crate::protocol::RECORD_START_PAGE;
use crate::terminal::TerminalClient;
use crate::utils::{format_hex, format_pages};

use super::read::write_contents;
use super::ui::Painter;
use super::write::now_unix;

#[derive(Debug, Serialize)]
struct EncodeReport<'a> {
    path: &'a Path,
    checksum: String,
    pages: Vec<String>,
}

/// Executes the `encode` command.
#[instrument(skip_all, level = "info", fields(path = %args.path().display()))]
pub(crate) fn encode<W>(
    args: &EncodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let record = args.record().to_record(now_unix())?;
    let block = SpoolCodec::encode(&record)?;
    fs::write(args.path(), block.as_bytes())
        .with_context(|| format!("failed to write block file `{}`", args.path().display()))?;
    info!(checksum = block.checksum(), "wrote block file");

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{} {}",
                painter.done("Encoded spool record to"),
                painter.value(args.path().display().to_string())
            )?;
            writeln!(out, "{}", format_pages(RECORD_START_PAGE, block.as_bytes()))?;
        }
        OutputFormat::Json => {
            let report = EncodeReport {
                path: args.path(),
                checksum: format!("{:#04X}", block.checksum()),
                pages: block.pages().map(|(_page, data)| format_hex(&data)).collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

/// Executes the `decode` command.
#[instrument(skip_all, level = "info", fields(path = %args.path().display()))]
pub(crate) fn decode<W>(
    args: &DecodeArgs,
    catalog: &MaterialCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let bytes = fs::read(args.path())
        .with_context(|| format!("failed to read block file `{}`", args.path().display()))?;
    let contents = SpoolCodec::inspect(&bytes)?;
    write_contents(&contents, catalog, out, terminal_client, output_format)
}

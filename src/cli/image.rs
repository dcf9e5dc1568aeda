use std::io;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::cli::{InitImageArgs, OutputFormat};
use crate::hw::{DEFAULT_UID, ImageTag};
use crate::terminal::TerminalClient;
use crate::utils::format_hex;

use super::ui::Painter;

#[derive(Debug, Serialize)]
struct InitImageReport<'a> {
    path: &'a Path,
    uid: String,
    bytes: usize,
}

/// Executes the `init-image` command.
#[instrument(skip_all, level = "info", fields(path = %args.path().display()))]
pub(crate) fn init<W>(
    args: &InitImageArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let uid = args.uid().map_or(DEFAULT_UID, Into::into);
    let image = ImageTag::create_blank(args.path(), uid)?;
    let report = InitImageReport {
        path: args.path(),
        uid: format_hex(&image.memory().uid()),
        bytes: image.memory().as_bytes().len(),
    };

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{} {} (UID {}, {} bytes)",
                painter.done("Created blank tag image"),
                painter.value(report.path.display().to_string()),
                report.uid,
                report.bytes
            )?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

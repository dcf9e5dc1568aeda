use std::io;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::catalog::{MaterialCatalog, MaterialDefinition};
use crate::cli::OutputFormat;
use crate::handlers::{SpoolRecord, TagContents};
use crate::hw::{SessionConfig, TagSession, TagTransport};
use crate::terminal::TerminalClient;

use super::ui::{Painter, SpoolRecordView};

/// Machine-readable view of what a tag or block file holds.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ContentsReport<'a> {
    Spool {
        record: &'a SpoolRecord,
        material: Option<&'a MaterialDefinition>,
    },
    Blank,
    Foreign,
}

/// Executes the `read` command.
#[instrument(skip_all, level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    transport: &mut dyn TagTransport,
    session_config: SessionConfig,
    catalog: &MaterialCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let mut session = TagSession::new(transport, session_config);
    let contents = session.inspect_spool().await?;
    write_contents(&contents, catalog, out, terminal_client, output_format)
}

/// Renders tag contents with their catalog match.
pub(crate) fn write_contents<W>(
    contents: &TagContents,
    catalog: &MaterialCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let report = match contents {
        TagContents::Spool(record) => {
            let material = match catalog.lookup_record(record) {
                Ok(material) => Some(material),
                Err(error) => {
                    debug!(%error, "record has no catalog entry");
                    None
                }
            };
            ContentsReport::Spool { record, material }
        }
        TagContents::Blank => ContentsReport::Blank,
        TagContents::Foreign => ContentsReport::Foreign,
    };

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", painter.contents(contents))?;
            if let ContentsReport::Spool { record, material } = report {
                writeln!(out, "{}", SpoolRecordView::new(record, material, &painter))?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

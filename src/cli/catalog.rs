use std::io;

use anyhow::Result;

use crate::catalog::MaterialCatalog;
use crate::cli::OutputFormat;
use crate::terminal::TerminalClient;

use super::ui::{CatalogView, Painter};

/// Executes the `catalog` command.
pub(crate) fn run<W>(
    catalog: &MaterialCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", CatalogView::new(catalog, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, catalog.entries())?;
            writeln!(out)?;
        }
    }
    Ok(())
}

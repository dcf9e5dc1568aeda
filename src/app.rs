use std::io;
use std::path::PathBuf;

use anyhow::Result;
use directories::ProjectDirs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::catalog::MaterialCatalog;
use crate::cli::{Command, LogLevel, OutputFormat, RunOptions};
use crate::hw::{SessionConfig, tag_transport_from_backend};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

const CATALOG_FILE_NAME: &str = "catalog.json";

/// Runs the CLI command against the process terminal.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = spooltag::Args::try_parse_from([
///     "spooltag",
///     "--output",
///     "json",
///     "--fake",
///     "read",
/// ])?;
/// let (command, options) = args.into_command_and_options();
/// let mut out = Vec::new();
/// spooltag::run(command, options, &mut out).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the tag session fails, or
/// output writing fails.
pub async fn run<W>(command: Command, options: RunOptions, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, options, out, &SystemTerminalClient).await
}

/// Runs the CLI command with an injected terminal client.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// struct FakeTerminal;
/// impl spooltag::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let mut out = Vec::new();
/// spooltag::run_with_clients(
///     spooltag::Command::Catalog,
///     spooltag::RunOptions::default(),
///     &mut out,
///     &FakeTerminal,
/// )
/// .await?;
/// assert!(String::from_utf8(out)?.contains("Ultimaker"));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the tag session fails, or
/// output writing fails.
#[instrument(
    skip(options, out, terminal_client),
    level = "info",
    fields(command = %command.name(), log_level = ?options.log_level())
)]
pub async fn run_with_clients<W>(
    command: Command,
    options: RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "spooltag",
        terminal_client.stderr_is_terminal(),
        options.log_level().map(LogLevel::as_level_filter),
    )?;

    let output_format = options.output_format().unwrap_or_else(|| {
        if terminal_client.stdout_is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        }
    });

    match &command {
        Command::Catalog => {
            let catalog = load_catalog(options.catalog_path())?;
            crate::cli::catalog::run(&catalog, out, terminal_client, output_format)
        }
        Command::Encode(args) => {
            crate::cli::codec::encode(args, out, terminal_client, output_format)
        }
        Command::Decode(args) => {
            let catalog = load_catalog(options.catalog_path())?;
            crate::cli::codec::decode(args, &catalog, out, terminal_client, output_format)
        }
        Command::InitImage(args) => {
            crate::cli::image::init(args, out, terminal_client, output_format)
        }
        Command::Read | Command::Write(_) => {
            let catalog = load_catalog(options.catalog_path())?;
            let mut transport = tag_transport_from_backend(options.tag_backend()?)?;

            let cancellation = CancellationToken::new();
            let session_config = SessionConfig::builder()
                .cancellation(cancellation.clone())
                .maybe_page_timeout(options.page_timeout())
                .build();
            let interrupt = tokio::spawn(cancel_on_interrupt(cancellation));

            let result = match &command {
                Command::Write(args) => {
                    crate::cli::write::run(
                        transport.as_mut(),
                        session_config,
                        args,
                        &catalog,
                        out,
                        terminal_client,
                        output_format,
                    )
                    .await
                }
                _ => {
                    crate::cli::read::run(
                        transport.as_mut(),
                        session_config,
                        &catalog,
                        out,
                        terminal_client,
                        output_format,
                    )
                    .await
                }
            };
            interrupt.abort();
            result
        }
    }
}

async fn cancel_on_interrupt(cancellation: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received; stopping before the next page");
            cancellation.cancel();
        }
        Err(error) => debug!(%error, "interrupt handler unavailable"),
    }
}

/// Loads the explicit catalog, else the user catalog file, else the built-in table.
fn load_catalog(explicit: Option<&PathBuf>) -> Result<MaterialCatalog> {
    if let Some(path) = explicit {
        return Ok(MaterialCatalog::load(path)?);
    }
    match default_catalog_path() {
        Some(path) if path.is_file() => Ok(MaterialCatalog::load(path)?),
        _ => Ok(MaterialCatalog::builtin()),
    }
}

fn default_catalog_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spooltag")
        .map(|project_dirs| project_dirs.config_dir().join(CATALOG_FILE_NAME))
}

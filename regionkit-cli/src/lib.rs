//! Command-line interface for regionkit's reference-data tooling.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use regionkit_data::ResponseStatus;
use tracing_subscriber::EnvFilter;

mod audit;
mod error;
mod query;
mod sync;
mod workspace;

pub use error::CliError;

use audit::{AuditArgs, run_audit};
use query::{GetArgs, ListArgs, run_get, run_list};
use sync::{SyncArgs, run_sync};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_DATA_DIR: &str = "data-dir";
pub(crate) const ARG_KIND: &str = "kind";
pub(crate) const ARG_ID: &str = "id";
pub(crate) const ENV_SYNC_DATABASE: &str = "REGIONKIT_CMDS_SYNC_DATABASE";
pub(crate) const ENV_SYNC_DATA_DIR: &str = "REGIONKIT_CMDS_SYNC_DATA_DIR";
pub(crate) const ENV_LIST_KIND: &str = "REGIONKIT_CMDS_LIST_KIND";
pub(crate) const ENV_LIST_DATABASE: &str = "REGIONKIT_CMDS_LIST_DATABASE";
pub(crate) const ENV_LIST_DATA_DIR: &str = "REGIONKIT_CMDS_LIST_DATA_DIR";
pub(crate) const ENV_GET_KIND: &str = "REGIONKIT_CMDS_GET_KIND";
pub(crate) const ENV_GET_ID: &str = "REGIONKIT_CMDS_GET_ID";
pub(crate) const ENV_GET_DATABASE: &str = "REGIONKIT_CMDS_GET_DATABASE";
pub(crate) const ENV_GET_DATA_DIR: &str = "REGIONKIT_CMDS_GET_DATA_DIR";
pub(crate) const ENV_AUDIT_DATABASE: &str = "REGIONKIT_CMDS_AUDIT_DATABASE";

/// Run the regionkit CLI with the current process arguments and environment,
/// writing replies to stdout.
///
/// Returns the status of the reply; callers exit non-zero unless it is 2xx.
pub fn run() -> Result<ResponseStatus, CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

/// Install the stderr log subscriber, honouring `RUST_LOG` and defaulting to
/// `info`.
///
/// Fails when a global subscriber or logger is already installed.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<ResponseStatus, CliError> {
    match command {
        Command::Sync(args) => run_sync(args, writer),
        Command::List(args) => run_list(args, writer),
        Command::Get(args) => run_get(args, writer),
        Command::Audit(args) => run_audit(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "regionkit",
    about = "Synchronize and query the administrative-region reference store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resync reference data from the golden CSV files.
    Sync(SyncArgs),
    /// List entities of a kind.
    List(ListArgs),
    /// Fetch one entity by identifier.
    Get(GetArgs),
    /// Report row and orphan counts per kind.
    Audit(AuditArgs),
}

#[cfg(test)]
mod tests;

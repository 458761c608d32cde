//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use regionkit_cli::{CliError, init_logging};

fn main() -> ExitCode {
    if let Err(err) = init_logging() {
        eprintln!("regionkit: logging disabled: {err}");
    }
    match regionkit_cli::run() {
        Ok(status) if status.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("regionkit: {err}");
            ExitCode::from(2)
        }
    }
}

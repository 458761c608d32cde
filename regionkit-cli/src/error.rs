//! Error types emitted by the regionkit CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use regionkit_core::{SchemaError, StoreError, UnknownKind};
use regionkit_data::SyncError;
use thiserror::Error;

/// Errors emitted by the regionkit CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A positional kind argument named no known kind.
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
    /// The directory that should hold the database could not be created.
    #[error("failed to prepare database directory for {path:?}: {source}")]
    PrepareDatabaseDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening or migrating the reference store failed.
    #[error("failed to open reference store at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: Box<SchemaError>,
    },
    /// The golden-source directory could not be opened.
    #[error("failed to open golden-source directory {path:?}: {source}")]
    OpenDataDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The synchronizer could not be built from the resolved settings.
    #[error("failed to start synchronizer: {source}")]
    Synchronizer {
        #[source]
        source: Box<SyncError>,
    },
    /// Auditing the store failed.
    #[error("failed to audit {path:?}: {source}")]
    Audit {
        path: Utf8PathBuf,
        #[source]
        source: Box<StoreError>,
    },
    /// Serializing a reply failed.
    #[error("failed to serialize reply: {0}")]
    SerializeReply(#[source] serde_json::Error),
    /// Writing to stdout failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

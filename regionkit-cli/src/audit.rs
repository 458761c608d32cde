//! `audit` command: row and orphan counts per kind.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use regionkit_core::{EntityKind, ReferenceStore, StoreError};
use regionkit_data::{Reply, ResponseStatus};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, CliError, ENV_AUDIT_DATABASE,
    workspace::{open_store, require, write_replies},
};

/// CLI arguments for the `audit` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Report how many rows each kind holds and which rows \
                 reference a parent that is not stored.",
    about = "Audit referential integrity of the reference store"
)]
#[ortho_config(prefix = "REGIONKIT")]
pub(crate) struct AuditArgs {
    /// Path to the SQLite reference database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl AuditArgs {
    pub(crate) fn into_database(self) -> Result<Utf8PathBuf, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        require(merged.database, ARG_DATABASE, ENV_AUDIT_DATABASE)
    }
}

/// Audit line for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct KindAudit {
    pub(crate) kind: EntityKind,
    pub(crate) rows: usize,
    pub(crate) orphans: Vec<String>,
}

pub(crate) fn audit_store<S: ReferenceStore + ?Sized>(
    store: &S,
) -> Result<Vec<KindAudit>, StoreError> {
    EntityKind::ALL
        .into_iter()
        .map(|kind| {
            Ok(KindAudit {
                kind,
                rows: store.count(kind)?,
                orphans: store
                    .orphans(kind)?
                    .into_iter()
                    .map(|entity| entity.id)
                    .collect(),
            })
        })
        .collect()
}

pub(super) fn run_audit(args: AuditArgs, writer: &mut dyn Write) -> Result<ResponseStatus, CliError> {
    let database = args.into_database()?;
    run_audit_at(&database, writer)
}

pub(super) fn run_audit_at(
    database: &Utf8Path,
    writer: &mut dyn Write,
) -> Result<ResponseStatus, CliError> {
    let store = open_store(database)?;
    let audit = audit_store(&store).map_err(|source| CliError::Audit {
        path: database.to_path_buf(),
        source: Box::new(source),
    })?;
    let body = serde_json::to_value(&audit).map_err(CliError::SerializeReply)?;
    write_replies(writer, &[Reply::Data(body)])
}

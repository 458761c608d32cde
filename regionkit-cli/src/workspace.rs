//! Opening the reference store and golden source named by resolved settings,
//! and writing replies.

use std::{io::Write, sync::Arc};

use camino::Utf8Path;
use regionkit_core::{SqliteReferenceStore, SqliteStoreOptions};
use regionkit_data::{
    DirectorySource, HierarchyQueryService, Reply, ResponseStatus, SyncConfig, Synchronizer,
};
use regionkit_fs::ensure_parent_dir;

use crate::CliError;

/// Synchronizer wired to the on-disk store and golden source.
pub(crate) type DiskSynchronizer = Synchronizer<SqliteReferenceStore, DirectorySource>;

/// Query service over the on-disk store.
pub(crate) type DiskQueryService = HierarchyQueryService<SqliteReferenceStore, DirectorySource>;

/// Take a required setting, naming its flag and environment variable when
/// absent.
pub(crate) fn require<T>(
    value: Option<T>,
    field: &'static str,
    env: &'static str,
) -> Result<T, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

/// Open (creating if needed) the SQLite reference store at `path`.
pub(crate) fn open_store(path: &Utf8Path) -> Result<SqliteReferenceStore, CliError> {
    ensure_parent_dir(path).map_err(|source| CliError::PrepareDatabaseDir {
        path: path.to_path_buf(),
        source,
    })?;
    SqliteReferenceStore::open(path, SqliteStoreOptions::default()).map_err(|source| {
        CliError::OpenStore {
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    })
}

/// Build a synchronizer over the store at `database` and the golden files in
/// `data_dir`.
pub(crate) fn open_synchronizer(
    database: &Utf8Path,
    data_dir: &Utf8Path,
    config: SyncConfig,
) -> Result<DiskSynchronizer, CliError> {
    let store = open_store(database)?;
    let source = DirectorySource::open_ambient(data_dir).map_err(|source| CliError::OpenDataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;
    Synchronizer::new(Arc::new(store), Arc::new(source), config).map_err(|source| {
        CliError::Synchronizer {
            source: Box::new(source),
        }
    })
}

/// Write `replies` as JSON and return the status the process should report.
///
/// A single reply is written as its body; several are written as an array.
/// The first non-2xx status wins.
pub(crate) fn write_replies(
    writer: &mut dyn Write,
    replies: &[Reply],
) -> Result<ResponseStatus, CliError> {
    let mut bodies = replies
        .iter()
        .map(Reply::body)
        .collect::<Result<Vec<_>, _>>()
        .map_err(CliError::SerializeReply)?;
    let payload = if bodies.len() == 1 {
        bodies.pop().map_or_else(
            || Ok(String::new()),
            |body| serde_json::to_string_pretty(&body),
        )
    } else {
        serde_json::to_string_pretty(&bodies)
    }
    .map_err(CliError::SerializeReply)?;
    writeln!(writer, "{payload}").map_err(CliError::WriteOutput)?;

    let status = replies
        .iter()
        .map(Reply::status)
        .find(|status| !status.is_success())
        .or_else(|| replies.first().map(Reply::status))
        .unwrap_or(ResponseStatus::Ok);
    Ok(status)
}

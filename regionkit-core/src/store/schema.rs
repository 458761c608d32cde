#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

use crate::EntityKind;

/// Version recorded in `regionkit_schema_version` by [`initialise_schema`].
pub const SCHEMA_VERSION: i64 = 1;

/// Create the per-kind reference tables inside an existing SQLite database.
///
/// The function is idempotent: tables and indexes are created only when
/// missing. Existing installations must already record [`SCHEMA_VERSION`];
/// mismatches are rejected so migrations can be applied explicitly.
///
/// Parent columns carry no foreign-key constraint. Each kind is synchronized
/// independently, so a child table may briefly reference parents that have
/// not been ingested yet.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use regionkit_core::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create reference schema");
///
/// let tables: i64 = conn
///     .query_row(
///         "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
///             ('regions', 'sub_regions', 'districts', 'settlements')",
///         [],
///         |row| row.get(0),
///     )
///     .expect("count tables");
/// assert_eq!(tables, 4);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction".to_owned(),
            source,
        })?;

    for kind in EntityKind::ALL {
        create_kind_table(&transaction, kind)?;
    }
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction".to_owned(),
            source,
        })?;

    Ok(())
}

fn create_kind_table(transaction: &Transaction<'_>, kind: EntityKind) -> Result<(), SchemaError> {
    let schema = kind.schema();
    let create = match schema.parent_column {
        Some(parent) => format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
                {parent} TEXT NOT NULL,
                name TEXT NOT NULL
            ) WITHOUT ROWID",
            table = schema.table,
        ),
        None => format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
                name TEXT NOT NULL
            ) WITHOUT ROWID",
            table = schema.table,
        ),
    };
    run_migration_step(transaction, format!("create {}", schema.table), &create)?;

    if let Some(parent) = schema.parent_column {
        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{parent} ON {table}({parent}, id)",
            table = schema.table,
        );
        run_migration_step(transaction, format!("index {}", schema.table), &index)?;
    }
    Ok(())
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table".to_owned(),
        "CREATE TABLE IF NOT EXISTS regionkit_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM regionkit_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version".to_owned(),
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO regionkit_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version".to_owned(),
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: String,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the reference schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Opening the database file failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Destination database path.
        path: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Applying connection pragmas failed.
    #[error("failed to configure SQLite connection ({pragma})")]
    Configure {
        /// Pragma or setting being applied.
        pragma: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A migration statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Description of the failing step.
        step: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by an incompatible version.
    #[error(
        "expected reference schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this build expects.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        Connection::open_in_memory().expect("open in-memory database")
    }

    #[rstest]
    fn initialises_schema_records_version(mut connection: Connection) -> Result<(), SchemaError> {
        initialise_schema(&mut connection)?;

        let version: i64 = connection
            .query_row(
                "SELECT version FROM regionkit_schema_version LIMIT 1",
                [],
                |row| row.get(0),
            )
            .expect("schema version present");
        assert_eq!(version, SCHEMA_VERSION);

        let index_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .expect("query indexes");
        assert_eq!(index_count, 3, "expected one parent index per child kind");
        Ok(())
    }

    #[rstest]
    fn initialisation_is_idempotent(mut connection: Connection) -> Result<(), SchemaError> {
        initialise_schema(&mut connection)?;
        initialise_schema(&mut connection)?;

        let versions: i64 = connection
            .query_row("SELECT COUNT(*) FROM regionkit_schema_version", [], |row| {
                row.get(0)
            })
            .expect("count versions");
        assert_eq!(versions, 1);
        Ok(())
    }

    #[rstest]
    fn rejects_mismatched_version(mut connection: Connection) {
        connection
            .execute_batch(
                "CREATE TABLE regionkit_schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL DEFAULT ''
                ) WITHOUT ROWID;
                INSERT INTO regionkit_schema_version (version) VALUES (7);",
            )
            .expect("seed future version");

        let err = initialise_schema(&mut connection).expect_err("version mismatch");
        assert!(matches!(
            err,
            SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: 7
            }
        ));
    }

    #[rstest]
    fn sub_region_requires_parent_column(mut connection: Connection) -> Result<(), SchemaError> {
        initialise_schema(&mut connection)?;
        let outcome = connection.execute(
            "INSERT INTO sub_regions (id, region_id, name) VALUES ('1101', NULL, 'Simeulue')",
            [],
        );
        assert!(outcome.is_err(), "NULL parent must be rejected");
        Ok(())
    }
}

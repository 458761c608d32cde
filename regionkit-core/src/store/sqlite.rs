//! SQLite-backed reference store.
//!
//! The store owns a small, fixed pool of connections to one database file.
//! Each operation holds exactly one pooled connection for its duration; the
//! mutex guard returns it to the pool on every exit path.

use std::{
    fmt,
    path::Path,
    sync::{
        Mutex, MutexGuard, TryLockError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use log::debug;
use rusqlite::{Connection, Row, TransactionBehavior, params};

use super::schema::{SchemaError, initialise_schema};
use super::{ReferenceStore, StoreError, ensure_ancestor, ensure_fits};
use crate::{Ancestor, Entity, EntityKind};

/// Connection settings for [`SqliteReferenceStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteStoreOptions {
    /// Number of pooled connections. Zero is treated as one.
    pub pool_size: usize,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// [`ReferenceStore`] backed by a SQLite database.
pub struct SqliteReferenceStore {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    location: String,
}

impl fmt::Debug for SqliteReferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteReferenceStore")
            .field("location", &self.location)
            .field("pool_size", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl SqliteReferenceStore {
    /// Open (creating if needed) the database at `path` and initialise the
    /// reference schema.
    ///
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>, options: SqliteStoreOptions) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let pool_size = options.pool_size.max(1);

        let mut connections = Vec::with_capacity(pool_size);
        for slot in 0..pool_size {
            let mut connection =
                Connection::open(path).map_err(|source| SchemaError::Open {
                    path: location.clone(),
                    source,
                })?;
            configure(&connection, options.busy_timeout, true)?;
            if slot == 0 {
                initialise_schema(&mut connection)?;
            }
            connections.push(Mutex::new(connection));
        }
        debug!("opened reference store at {location} with {pool_size} connections");

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
            location,
        })
    }

    /// Open a private in-memory database with a single connection.
    pub fn in_memory() -> Result<Self, SchemaError> {
        let mut connection = Connection::open_in_memory().map_err(|source| SchemaError::Open {
            path: ":memory:".to_owned(),
            source,
        })?;
        configure(&connection, SqliteStoreOptions::default().busy_timeout, false)?;
        initialise_schema(&mut connection)?;
        Ok(Self {
            connections: vec![Mutex::new(connection)],
            next: AtomicUsize::new(0),
            location: ":memory:".to_owned(),
        })
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    /// Acquire a connection, preferring an idle one and otherwise waiting on
    /// the next slot in round-robin order.
    fn acquire(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        let size = self.connections.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed).rem_euclid(size);
        for offset in 0..size {
            let slot = start.wrapping_add(offset).rem_euclid(size);
            let Some(mutex) = self.connections.get(slot) else {
                continue;
            };
            match mutex.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::PoolPoisoned),
            }
        }
        self.connections
            .get(start)
            .ok_or(StoreError::PoolPoisoned)?
            .lock()
            .map_err(|_| StoreError::PoolPoisoned)
    }

    fn query_entities(
        &self,
        kind: EntityKind,
        operation: &'static str,
        sql: &str,
        parameter: Option<&str>,
    ) -> Result<Vec<Entity>, StoreError> {
        let sqlite = |source| StoreError::Sqlite {
            kind,
            operation,
            source,
        };
        let connection = self.acquire()?;
        let mut statement = connection.prepare_cached(sql).map_err(sqlite)?;
        let rows = match parameter {
            Some(value) => statement.query_map([value], read_entity),
            None => statement.query_map([], read_entity),
        }
        .map_err(sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(sqlite)
    }
}

fn configure(connection: &Connection, busy_timeout: Duration, wal: bool) -> Result<(), SchemaError> {
    connection
        .busy_timeout(busy_timeout)
        .map_err(|source| SchemaError::Configure {
            pragma: "busy_timeout",
            source,
        })?;
    // Kinds are synchronized independently, so parents may arrive after children.
    connection
        .pragma_update(None, "foreign_keys", false)
        .map_err(|source| SchemaError::Configure {
            pragma: "foreign_keys",
            source,
        })?;
    if wal {
        connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|source| SchemaError::Configure {
                pragma: "journal_mode",
                source,
            })?;
    }
    Ok(())
}

fn read_entity(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn select_columns(kind: EntityKind, alias: &str) -> String {
    match kind.schema().parent_column {
        Some(parent) => format!("{alias}.id, {alias}.{parent}, {alias}.name"),
        None => format!("{alias}.id, NULL, {alias}.name"),
    }
}

fn upsert_sql(kind: EntityKind) -> String {
    let table = kind.schema().table;
    match kind.schema().parent_column {
        Some(parent) => format!(
            "INSERT INTO {table} (id, {parent}, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET {parent} = excluded.{parent}, name = excluded.name"
        ),
        None => format!(
            "INSERT INTO {table} (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name"
        ),
    }
}

/// Build the join chain from `kind` up `hops` parent levels.
///
/// Alias `t0` is the listed table; each further alias is one level higher.
/// The filter applies to the parent column of the last joined table.
fn ancestor_sql(kind: EntityKind, ancestor: EntityKind, hops: usize) -> Result<String, StoreError> {
    let invalid = || StoreError::InvalidAncestor { kind, ancestor };
    let mut sql = format!(
        "SELECT {} FROM {} AS t0",
        select_columns(kind, "t0"),
        kind.schema().table
    );
    let mut current = kind;
    for level in 1..hops {
        let parent = current.parent().ok_or_else(invalid)?;
        let column = current.schema().parent_column.ok_or_else(invalid)?;
        let previous = level.wrapping_sub(1);
        sql.push_str(&format!(
            " JOIN {table} AS t{level} ON t{previous}.{column} = t{level}.id",
            table = parent.schema().table,
        ));
        current = parent;
    }
    let column = current.schema().parent_column.ok_or_else(invalid)?;
    let last = hops.wrapping_sub(1);
    sql.push_str(&format!(" WHERE t{last}.{column} = ?1 ORDER BY t0.id"));
    Ok(sql)
}

impl ReferenceStore for SqliteReferenceStore {
    fn upsert(&self, kind: EntityKind, entities: &[&Entity]) -> Result<usize, StoreError> {
        ensure_fits(kind, entities)?;
        if entities.is_empty() {
            return Ok(0);
        }
        let sqlite = |source| StoreError::Sqlite {
            kind,
            operation: "upsert",
            source,
        };

        let mut connection = self.acquire()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;
        {
            let mut statement = transaction.prepare_cached(&upsert_sql(kind)).map_err(sqlite)?;
            for entity in entities {
                let outcome = match &entity.parent_id {
                    Some(parent) => statement.execute(params![entity.id, parent, entity.name]),
                    None => statement.execute(params![entity.id, entity.name]),
                };
                outcome.map_err(sqlite)?;
            }
        }
        transaction.commit().map_err(sqlite)?;
        Ok(entities.len())
    }

    fn list_all(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} AS t0 ORDER BY t0.id",
            select_columns(kind, "t0"),
            kind.schema().table
        );
        self.query_entities(kind, "list all", &sql, None)
    }

    fn list_by_ancestor(
        &self,
        kind: EntityKind,
        ancestor: &Ancestor,
    ) -> Result<Vec<Entity>, StoreError> {
        let hops = ensure_ancestor(kind, ancestor)?;
        let sql = ancestor_sql(kind, ancestor.kind, hops)?;
        self.query_entities(kind, "list by ancestor", &sql, Some(ancestor.id.as_str()))
    }

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} AS t0 WHERE t0.id = ?1",
            select_columns(kind, "t0"),
            kind.schema().table
        );
        Ok(self
            .query_entities(kind, "find by id", &sql, Some(id))?
            .into_iter()
            .next())
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.schema().table);
        let connection = self.acquire()?;
        let count: i64 = connection
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| StoreError::Sqlite {
                kind,
                operation: "count",
                source,
            })?;
        usize::try_from(count).map_err(|_| StoreError::CountOutOfRange { kind, count })
    }

    fn orphans(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        let schema = kind.schema();
        let (Some(column), Some(parent)) = (schema.parent_column, schema.parent) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {columns} FROM {table} AS t0
             LEFT JOIN {parent_table} AS p ON t0.{column} = p.id
             WHERE p.id IS NULL ORDER BY t0.id",
            columns = select_columns(kind, "t0"),
            table = schema.table,
            parent_table = parent.schema().table,
        );
        self.query_entities(kind, "orphans", &sql, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> SqliteReferenceStore {
        SqliteReferenceStore::in_memory().expect("open in-memory store")
    }

    #[rstest]
    #[case(EntityKind::SubRegion, EntityKind::Region, 1, "WHERE t0.region_id = ?1")]
    #[case(
        EntityKind::Settlement,
        EntityKind::Region,
        3,
        "JOIN sub_regions AS t2 ON t1.sub_region_id = t2.id WHERE t2.region_id = ?1"
    )]
    #[case(
        EntityKind::Settlement,
        EntityKind::SubRegion,
        2,
        "JOIN districts AS t1 ON t0.district_id = t1.id WHERE t1.sub_region_id = ?1"
    )]
    fn builds_join_chain_per_hop(
        #[case] kind: EntityKind,
        #[case] ancestor: EntityKind,
        #[case] hops: usize,
        #[case] fragment: &str,
    ) {
        let sql = ancestor_sql(kind, ancestor, hops).expect("build query");
        assert!(sql.contains(fragment), "unexpected query: {sql}");
        assert!(sql.ends_with("ORDER BY t0.id"));
    }

    #[rstest]
    fn upsert_is_idempotent(store: SqliteReferenceStore) {
        let aceh = Entity::root("11", "Aceh");
        let sumut = Entity::root("12", "Sumut");
        for _ in 0..2 {
            let written = store
                .upsert(EntityKind::Region, &[&aceh, &sumut])
                .expect("upsert regions");
            assert_eq!(written, 2);
        }
        assert_eq!(store.count(EntityKind::Region).expect("count"), 2);
        assert_eq!(
            store.list_all(EntityKind::Region).expect("list"),
            vec![aceh, sumut]
        );
    }

    #[rstest]
    fn upsert_replaces_parent_and_name(store: SqliteReferenceStore) {
        store
            .upsert(EntityKind::District, &[&Entity::child("110101", "1101", "Teupah")])
            .expect("seed district");
        let moved = Entity::child("110101", "1102", "Teupah Selatan");
        store
            .upsert(EntityKind::District, &[&moved])
            .expect("update district");

        assert_eq!(store.count(EntityKind::District).expect("count"), 1);
        assert_eq!(
            store.find_by_id(EntityKind::District, "110101").expect("find"),
            Some(moved)
        );
    }

    #[rstest]
    fn empty_upsert_writes_nothing(store: SqliteReferenceStore) {
        assert_eq!(store.upsert(EntityKind::Settlement, &[]).expect("noop"), 0);
    }

    #[rstest]
    fn orphans_ignore_resolved_children(store: SqliteReferenceStore) {
        store
            .upsert(EntityKind::Region, &[&Entity::root("11", "Aceh")])
            .expect("seed region");
        let resolved = Entity::child("1101", "11", "Simeulue");
        let orphan = Entity::child("7101", "71", "Bolaang Mongondow");
        store
            .upsert(EntityKind::SubRegion, &[&resolved, &orphan])
            .expect("seed sub-regions");

        assert_eq!(
            store.orphans(EntityKind::SubRegion).expect("orphans"),
            vec![orphan]
        );
    }

    #[rstest]
    fn pooled_connections_share_one_database() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("regions.db");
        let options = SqliteStoreOptions {
            pool_size: 3,
            ..SqliteStoreOptions::default()
        };
        let store = SqliteReferenceStore::open(&path, options).expect("open store");
        assert_eq!(store.pool_size(), 3);

        let entities: Vec<Entity> = (11..=40)
            .map(|code| Entity::root(code.to_string(), format!("Region {code}")))
            .collect();
        std::thread::scope(|scope| {
            for chunk in entities.chunks(10) {
                let store = &store;
                scope.spawn(move || {
                    let refs: Vec<&Entity> = chunk.iter().collect();
                    store.upsert(EntityKind::Region, &refs).expect("concurrent upsert");
                });
            }
        });
        assert_eq!(store.count(EntityKind::Region).expect("count"), 30);
        drop(store);

        let reopened =
            SqliteReferenceStore::open(&path, SqliteStoreOptions::default()).expect("reopen");
        assert_eq!(reopened.count(EntityKind::Region).expect("count"), 30);
    }
}

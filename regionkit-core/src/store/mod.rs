//! Reference Store contract.
//!
//! The [`ReferenceStore`] trait describes the relational persistence layer
//! holding one table per [`EntityKind`]. Implementations must be shareable
//! across worker threads: the synchronizer issues one [`ReferenceStore::upsert`]
//! per partition from a bounded pool of workers.

use thiserror::Error;

use crate::{Ancestor, Entity, EntityKind};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteReferenceStore, SqliteStoreOptions};

/// Persistence contract for hierarchical reference data.
///
/// # Examples
///
/// ```rust
/// use regionkit_core::{Ancestor, Entity, EntityKind, ReferenceStore, SqliteReferenceStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteReferenceStore::in_memory()?;
/// let region = Entity::root("11", "Aceh");
/// let sub_region = Entity::child("1101", "11", "Simeulue");
/// store.upsert(EntityKind::Region, &[&region])?;
/// store.upsert(EntityKind::SubRegion, &[&sub_region])?;
///
/// let found = store.list_by_ancestor(EntityKind::SubRegion, &Ancestor::region("11"))?;
/// assert_eq!(found, vec![sub_region]);
/// # Ok(())
/// # }
/// ```
pub trait ReferenceStore: Send + Sync {
    /// Insert or update every entity in `entities` as one atomic write.
    ///
    /// Rows are keyed by identifier. Existing rows have their parent
    /// reference and name replaced; their identifier never changes. Running
    /// the same call twice leaves the same final state. Returns the number of
    /// rows written.
    fn upsert(&self, kind: EntityKind, entities: &[&Entity]) -> Result<usize, StoreError>;

    /// Return every row of `kind`, ordered by identifier.
    fn list_all(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError>;

    /// Return every row of `kind` whose chain of parent references reaches
    /// `ancestor`, ordered by identifier.
    ///
    /// Fails with [`StoreError::InvalidAncestor`] unless `ancestor.kind` is
    /// strictly above `kind`.
    fn list_by_ancestor(
        &self,
        kind: EntityKind,
        ancestor: &Ancestor,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Look up a single row by identifier.
    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError>;

    /// Number of rows of `kind`.
    fn count(&self, kind: EntityKind) -> Result<usize, StoreError>;

    /// Rows of `kind` whose parent reference resolves to no parent row.
    ///
    /// The store does not enforce referential integrity at write time, so
    /// kinds can be synchronized independently; this reports the gaps.
    fn orphans(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError>;
}

impl<S: ReferenceStore + ?Sized> ReferenceStore for std::sync::Arc<S> {
    fn upsert(&self, kind: EntityKind, entities: &[&Entity]) -> Result<usize, StoreError> {
        (**self).upsert(kind, entities)
    }

    fn list_all(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        (**self).list_all(kind)
    }

    fn list_by_ancestor(
        &self,
        kind: EntityKind,
        ancestor: &Ancestor,
    ) -> Result<Vec<Entity>, StoreError> {
        (**self).list_by_ancestor(kind, ancestor)
    }

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError> {
        (**self).find_by_id(kind, id)
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        (**self).count(kind)
    }

    fn orphans(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        (**self).orphans(kind)
    }
}

/// Errors raised by [`ReferenceStore`] implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The ancestor kind is not strictly above the queried kind.
    #[error("{ancestor} is not an ancestor of {kind}")]
    InvalidAncestor {
        /// Kind being listed.
        kind: EntityKind,
        /// Kind supplied as the ancestor.
        ancestor: EntityKind,
    },
    /// An entity's parent reference does not match its kind.
    #[error("{kind} {id} has an invalid parent reference")]
    ParentMismatch {
        /// Kind being written.
        kind: EntityKind,
        /// Identifier of the rejected entity.
        id: String,
    },
    /// The connection pool was left unusable by a panicking holder.
    #[error("store connection pool is poisoned")]
    PoolPoisoned,
    /// The write failed for a reason other than the expected key conflict.
    #[error("failed to write {rows} {kind} rows: {message}")]
    WriteFailed {
        /// Kind being written.
        kind: EntityKind,
        /// Number of rows in the failed write.
        rows: usize,
        /// Description of the failure.
        message: String,
    },
    /// SQLite reported an error.
    #[cfg(feature = "store-sqlite")]
    #[error("SQLite operation '{operation}' failed on {kind}")]
    Sqlite {
        /// Kind being read or written.
        kind: EntityKind,
        /// Short description of the statement.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A row count did not fit the platform's integer width.
    #[error("{kind} row count {count} exceeds the platform range")]
    CountOutOfRange {
        /// Kind being counted.
        kind: EntityKind,
        /// Count reported by the store.
        count: i64,
    },
}

pub(crate) fn ensure_ancestor(kind: EntityKind, ancestor: &Ancestor) -> Result<usize, StoreError> {
    kind.hops_to(ancestor.kind)
        .ok_or(StoreError::InvalidAncestor {
            kind,
            ancestor: ancestor.kind,
        })
}

pub(crate) fn ensure_fits(kind: EntityKind, entities: &[&Entity]) -> Result<(), StoreError> {
    match entities.iter().find(|entity| !entity.fits(kind)) {
        Some(entity) => Err(StoreError::ParentMismatch {
            kind,
            id: entity.id.clone(),
        }),
        None => Ok(()),
    }
}

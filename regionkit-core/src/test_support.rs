//! Test-only, in-memory `ReferenceStore` implementation used by unit and
//! behaviour tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::store::{ensure_ancestor, ensure_fits};
use crate::{Ancestor, Entity, EntityKind, ReferenceStore, StoreError};

type UpsertHook = Arc<dyn Fn(EntityKind, &[&Entity]) + Send + Sync>;

/// In-memory `ReferenceStore` implementation used in tests.
///
/// Rows live in one ordered map per kind. Writes touching an identifier
/// registered with [`MemoryStore::fail_on_id`] fail as a whole, which lets
/// tests exercise partition isolation.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<EntityKind, BTreeMap<String, Entity>>>,
    failing_ids: BTreeSet<String>,
    upserts: AtomicUsize,
    hook: Option<UpsertHook>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("failing_ids", &self.failing_ids)
            .field("upserts", &self.upserts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create a store pre-populated with `(kind, entity)` pairs.
    pub fn seeded<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (EntityKind, Entity)>,
    {
        let mut tables: BTreeMap<EntityKind, BTreeMap<String, Entity>> = BTreeMap::new();
        for (kind, entity) in rows {
            tables
                .entry(kind)
                .or_default()
                .insert(entity.id.clone(), entity);
        }
        Self {
            tables: Mutex::new(tables),
            ..Self::default()
        }
    }

    /// Fail every write that includes `id`.
    #[must_use]
    pub fn fail_on_id(mut self, id: impl Into<String>) -> Self {
        self.failing_ids.insert(id.into());
        self
    }

    /// Run `hook` at the start of every upsert, before anything is written.
    #[must_use]
    pub fn on_upsert(
        mut self,
        hook: impl Fn(EntityKind, &[&Entity]) + Send + Sync + 'static,
    ) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Number of upsert calls received, including failed ones.
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn read<T>(
        &self,
        kind: EntityKind,
        view: impl FnOnce(&BTreeMap<String, Entity>) -> T,
    ) -> Result<T, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::PoolPoisoned)?;
        let empty = BTreeMap::new();
        Ok(view(tables.get(&kind).unwrap_or(&empty)))
    }
}

impl ReferenceStore for MemoryStore {
    fn upsert(&self, kind: EntityKind, entities: &[&Entity]) -> Result<usize, StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook(kind, entities);
        }
        ensure_fits(kind, entities)?;
        if let Some(entity) = entities
            .iter()
            .find(|entity| self.failing_ids.contains(&entity.id))
        {
            return Err(StoreError::WriteFailed {
                kind,
                rows: entities.len(),
                message: format!("injected failure for {}", entity.id),
            });
        }

        let mut tables = self.tables.lock().map_err(|_| StoreError::PoolPoisoned)?;
        let table = tables.entry(kind).or_default();
        for entity in entities {
            table.insert(entity.id.clone(), (*entity).clone());
        }
        Ok(entities.len())
    }

    fn list_all(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        self.read(kind, |table| table.values().cloned().collect())
    }

    fn list_by_ancestor(
        &self,
        kind: EntityKind,
        ancestor: &Ancestor,
    ) -> Result<Vec<Entity>, StoreError> {
        ensure_ancestor(kind, ancestor)?;
        let tables = self.tables.lock().map_err(|_| StoreError::PoolPoisoned)?;
        let Some(table) = tables.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(table
            .values()
            .filter(|entity| reaches(&tables, kind, entity, ancestor))
            .cloned()
            .collect())
    }

    fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError> {
        self.read(kind, |table| table.get(id).cloned())
    }

    fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        self.read(kind, BTreeMap::len)
    }

    fn orphans(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        let Some(parent_kind) = kind.parent() else {
            return Ok(Vec::new());
        };
        let tables = self.tables.lock().map_err(|_| StoreError::PoolPoisoned)?;
        let parents = tables.get(&parent_kind);
        Ok(tables
            .get(&kind)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|entity| {
                entity.parent_id.as_ref().is_some_and(|parent| {
                    !parents.is_some_and(|rows| rows.contains_key(parent))
                })
            })
            .cloned()
            .collect())
    }
}

/// Walk parent references from `entity` up to the ancestor's level.
fn reaches(
    tables: &BTreeMap<EntityKind, BTreeMap<String, Entity>>,
    kind: EntityKind,
    entity: &Entity,
    ancestor: &Ancestor,
) -> bool {
    let mut current_kind = kind;
    let mut parent_id = entity.parent_id.clone();
    while let (Some(id), Some(parent_kind)) = (parent_id, current_kind.parent()) {
        if parent_kind == ancestor.kind {
            return id == ancestor.id;
        }
        parent_id = tables
            .get(&parent_kind)
            .and_then(|rows| rows.get(&id))
            .and_then(|row| row.parent_id.clone());
        current_kind = parent_kind;
    }
    false
}

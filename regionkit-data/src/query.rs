//! Hierarchical Query Service with lazy self-healing.
//!
//! An empty result is a normal outcome, not an error. For kinds named by the
//! [`HealPolicy`], a miss triggers at most one resync of that kind followed by
//! exactly one retry before the (possibly still empty) result is returned.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;
use regionkit_core::{
    Ancestor, Entity, EntityKind, InvalidIdentifier, ReferenceStore, StoreError,
    validate_identifier,
};
use thiserror::Error;

use crate::{
    source::GoldenSource,
    sync::{SyncError, SyncReport, Synchronizer},
};

/// Kinds whose misses trigger a resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealPolicy {
    kinds: BTreeSet<EntityKind>,
}

impl Default for HealPolicy {
    /// Regions and sub-regions heal; districts and settlements do not.
    fn default() -> Self {
        Self::only([EntityKind::Region, EntityKind::SubRegion])
    }
}

impl HealPolicy {
    /// Heal every kind.
    #[must_use]
    pub fn all() -> Self {
        Self::only(EntityKind::ALL)
    }

    /// Never heal.
    #[must_use]
    pub fn none() -> Self {
        Self {
            kinds: BTreeSet::new(),
        }
    }

    /// Heal exactly the given kinds.
    pub fn only(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Whether a miss on `kind` triggers a resync.
    #[must_use]
    pub fn heals(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Result of a listing.
#[derive(Debug)]
pub struct Lookup {
    /// Matching rows, ordered by identifier.
    pub entities: Vec<Entity>,
    /// Report of the resync this call ran, if it ran one.
    pub resync: Option<SyncReport>,
}

/// Result of a single-row lookup.
#[derive(Debug)]
pub struct Found {
    /// The row, if present.
    pub entity: Option<Entity>,
    /// Report of the resync this call ran, if it ran one.
    pub resync: Option<SyncReport>,
}

/// Faults raised by the query service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The request identifier was rejected before querying.
    #[error(transparent)]
    Invalid(#[from] InvalidIdentifier),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The self-healing resync failed before writing anything.
    #[error("self-healing resync failed")]
    Resync(#[from] SyncError),
}

#[derive(Debug, Default)]
struct HealGuard {
    flight: Mutex<()>,
    generation: AtomicU64,
}

/// Read-side service over a [`ReferenceStore`], falling back to a
/// [`Synchronizer`] on misses.
pub struct HierarchyQueryService<S, G> {
    store: Arc<S>,
    synchronizer: Arc<Synchronizer<S, G>>,
    policy: HealPolicy,
    guards: BTreeMap<EntityKind, HealGuard>,
}

impl<S, G> std::fmt::Debug for HierarchyQueryService<S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyQueryService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S, G> HierarchyQueryService<S, G>
where
    S: ReferenceStore,
    G: GoldenSource,
{
    /// Build a service reading the synchronizer's store.
    pub fn new(synchronizer: Arc<Synchronizer<S, G>>, policy: HealPolicy) -> Self {
        Self {
            store: Arc::clone(synchronizer.store()),
            synchronizer,
            policy,
            guards: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, HealGuard::default()))
                .collect(),
        }
    }

    /// Active heal policy.
    #[must_use]
    pub const fn policy(&self) -> &HealPolicy {
        &self.policy
    }

    /// Every row of `kind`. Never heals.
    pub fn list_all(&self, kind: EntityKind) -> Result<Lookup, QueryError> {
        Ok(Lookup {
            entities: self.store.list_all(kind)?,
            resync: None,
        })
    }

    /// Rows of `kind` below the `ancestor_kind` row identified by `raw_id`.
    pub fn list_by_ancestor(
        &self,
        kind: EntityKind,
        ancestor_kind: EntityKind,
        raw_id: &str,
    ) -> Result<Lookup, QueryError> {
        let ancestor = Ancestor::new(ancestor_kind, validate_identifier(ancestor_kind, raw_id)?);
        let (entities, resync) = self.self_healing(kind, Vec::is_empty, || {
            self.store.list_by_ancestor(kind, &ancestor)
        })?;
        Ok(Lookup { entities, resync })
    }

    /// Rows of `kind` within a region. For the region kind itself this
    /// addresses the region by identifier.
    pub fn list_by_region(&self, kind: EntityKind, raw_region_id: &str) -> Result<Lookup, QueryError> {
        if kind.is_root() {
            let found = self.find_by_id(kind, raw_region_id)?;
            return Ok(Lookup {
                entities: found.entity.into_iter().collect(),
                resync: found.resync,
            });
        }
        self.list_by_ancestor(kind, EntityKind::Region, raw_region_id)
    }

    /// A single row of `kind`.
    pub fn find_by_id(&self, kind: EntityKind, raw_id: &str) -> Result<Found, QueryError> {
        let id = validate_identifier(kind, raw_id)?;
        let (entity, resync) =
            self.self_healing(kind, Option::is_none, || self.store.find_by_id(kind, &id))?;
        Ok(Found { entity, resync })
    }

    fn self_healing<T>(
        &self,
        kind: EntityKind,
        is_miss: impl Fn(&T) -> bool,
        query: impl Fn() -> Result<T, StoreError>,
    ) -> Result<(T, Option<SyncReport>), QueryError> {
        let observed = self.generation(kind);
        let first = query()?;
        if !is_miss(&first) || !self.policy.heals(kind) {
            return Ok((first, None));
        }
        let resync = self.resync_once(kind, observed)?;
        Ok((query()?, resync))
    }

    fn generation(&self, kind: EntityKind) -> u64 {
        self.guards
            .get(&kind)
            .map_or(0, |guard| guard.generation.load(Ordering::SeqCst))
    }

    /// Resync `kind` unless another caller finished a resync since
    /// `observed` was read.
    fn resync_once(&self, kind: EntityKind, observed: u64) -> Result<Option<SyncReport>, QueryError> {
        let Some(guard) = self.guards.get(&kind) else {
            return Ok(Some(self.synchronizer.sync(kind)?));
        };
        let _flight = guard.flight.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.generation.load(Ordering::SeqCst) != observed {
            debug!("{kind} resync completed while waiting; retrying without another");
            return Ok(None);
        }
        debug!("empty {kind} lookup; resyncing once before retrying");
        let outcome = self.synchronizer.sync(kind);
        guard.generation.fetch_add(1, Ordering::SeqCst);
        Ok(Some(outcome?))
    }
}

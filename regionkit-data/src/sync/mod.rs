//! Synchronizer: Load, Partition, then upsert every partition concurrently.
//!
//! A run never rolls back. When some partitions fail, the others stay
//! committed and each row remains individually valid; a later run repairs the
//! rest because every write is idempotent.

mod cancel;
mod error;
mod report;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use log::{info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use regionkit_core::{EntityKind, ReferenceStore};

use crate::{
    loader::{MalformedPolicy, load},
    partition::{DEFAULT_PARTITION_CAPACITY, PartitionStrategy, partition},
    source::GoldenSource,
    upsert::{PartitionOutcome, apply_partition},
};

pub use cancel::CancelToken;
pub use error::SyncError;
pub use report::{SyncReport, SyncState};

/// Settings for a [`Synchronizer`], fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Target partition capacity.
    pub partition_capacity: usize,
    /// Worker threads writing partitions. Each holds at most one store
    /// connection at a time.
    pub workers: usize,
    /// Partitioning strategy.
    pub strategy: PartitionStrategy,
    /// Handling of malformed golden-source rows.
    pub malformed: MalformedPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            partition_capacity: DEFAULT_PARTITION_CAPACITY,
            workers: 4,
            strategy: PartitionStrategy::default(),
            malformed: MalformedPolicy::default(),
        }
    }
}

/// Orchestrates full resyncs of golden-source data into a store.
pub struct Synchronizer<S, G> {
    store: Arc<S>,
    source: Arc<G>,
    config: SyncConfig,
    pool: ThreadPool,
    states: Mutex<BTreeMap<EntityKind, SyncState>>,
}

impl<S, G> std::fmt::Debug for Synchronizer<S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, G> Synchronizer<S, G>
where
    S: ReferenceStore,
    G: GoldenSource,
{
    /// Build a synchronizer with a dedicated pool of `config.workers` threads.
    pub fn new(store: Arc<S>, source: Arc<G>, config: SyncConfig) -> Result<Self, SyncError> {
        if config.workers == 0 {
            return Err(SyncError::ZeroWorkers);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|index| format!("regionkit-sync-{index}"))
            .build()
            .map_err(|source| SyncError::WorkerPool {
                workers: config.workers,
                source,
            })?;
        Ok(Self {
            store,
            source,
            config,
            pool,
            states: Mutex::new(BTreeMap::new()),
        })
    }

    /// Configuration the synchronizer was built with.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Store written by this synchronizer.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Latest observable state for `kind`.
    #[must_use]
    pub fn state(&self, kind: EntityKind) -> SyncState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    /// Run one full resync of `kind`.
    pub fn sync(&self, kind: EntityKind) -> Result<SyncReport, SyncError> {
        self.sync_with_cancel(kind, &CancelToken::new())
    }

    /// Run one full resync of `kind`, stopping dispatch once `cancel` fires.
    pub fn sync_with_cancel(
        &self,
        kind: EntityKind,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        self.set_state(kind, SyncState::Running);
        let outcome = self.run(kind, cancel);
        let state = match &outcome {
            Ok(report) => report.state(),
            Err(err) => {
                match std::error::Error::source(err) {
                    Some(cause) => warn!("{kind} sync failed: {err}: {cause}"),
                    None => warn!("{kind} sync failed: {err}"),
                }
                SyncState::Completed {
                    succeeded: 0,
                    failed: 0,
                }
            }
        };
        self.set_state(kind, state);
        outcome
    }

    /// Resync every kind, root first. Each kind runs independently, so a
    /// failure in one does not stop the others.
    pub fn sync_all(&self, cancel: &CancelToken) -> Vec<Result<SyncReport, SyncError>> {
        EntityKind::ALL
            .into_iter()
            .map(|kind| self.sync_with_cancel(kind, cancel))
            .collect()
    }

    fn set_state(&self, kind: EntityKind, state: SyncState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, state);
    }

    fn run(&self, kind: EntityKind, cancel: &CancelToken) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let loaded = load(self.source.as_ref(), kind, self.config.malformed)
            .map_err(|source| SyncError::Load { kind, source })?;
        let partitions = partition(
            &loaded.entities,
            self.config.partition_capacity,
            self.config.strategy,
        )
        .map_err(|source| SyncError::Partition { kind, source })?;
        info!(
            "syncing {} {} in {} partitions",
            loaded.entities.len(),
            kind.plural(),
            partitions.len()
        );

        let store = self.store.as_ref();
        let outcomes: Vec<PartitionOutcome> = self.pool.install(|| {
            partitions
                .par_iter()
                .map(|part| {
                    if cancel.is_cancelled() {
                        PartitionOutcome::Cancelled
                    } else {
                        apply_partition(store, kind, part)
                    }
                })
                .collect()
        });

        let mut report = SyncReport {
            kind,
            loaded: loaded.entities.len(),
            rejected: loaded.rejected,
            partitions: partitions.len(),
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            rows_written: 0,
            failures: Vec::new(),
            elapsed: started.elapsed(),
        };
        for outcome in outcomes {
            match outcome {
                PartitionOutcome::Written(rows) => {
                    report.succeeded += 1;
                    report.rows_written += rows;
                }
                PartitionOutcome::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                PartitionOutcome::Cancelled => report.cancelled += 1,
            }
        }

        if report.is_complete() {
            info!(
                "synced {} {} across {} partitions",
                report.rows_written,
                kind.plural(),
                report.succeeded
            );
        } else {
            warn!(
                "partial {kind} sync: {} written, {} failed, {} cancelled",
                report.succeeded, report.failed, report.cancelled
            );
        }
        Ok(report)
    }
}

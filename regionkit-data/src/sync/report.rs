//! Aggregate results of a synchronization run.

use std::time::Duration;

use regionkit_core::EntityKind;

use crate::{loader::RejectedRow, upsert::PartitionFailure};

/// Observable lifecycle of a kind's synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No run has started yet.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The latest run finished with these partition counts.
    Completed {
        /// Partitions written.
        succeeded: usize,
        /// Partitions whose write failed.
        failed: usize,
    },
}

/// Summary of one full resync of one kind.
#[derive(Debug)]
pub struct SyncReport {
    /// Kind that was synchronized.
    pub kind: EntityKind,
    /// Well-formed rows loaded from the golden source.
    pub loaded: usize,
    /// Rows skipped as malformed.
    pub rejected: Vec<RejectedRow>,
    /// Partitions produced.
    pub partitions: usize,
    /// Partitions written.
    pub succeeded: usize,
    /// Partitions whose write failed.
    pub failed: usize,
    /// Partitions skipped after cancellation.
    pub cancelled: usize,
    /// Rows written across successful partitions.
    pub rows_written: usize,
    /// Details of every failed partition, ordered by key.
    pub failures: Vec<PartitionFailure>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl SyncReport {
    /// Whether every partition was written.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// State recorded once this run finishes.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        SyncState::Completed {
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

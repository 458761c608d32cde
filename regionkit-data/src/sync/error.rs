//! Run-level synchronization errors.

use regionkit_core::EntityKind;
use thiserror::Error;

use crate::{loader::LoadError, partition::PartitionError, source::SourceError};

/// Failure that prevented a run from dispatching any partition.
///
/// Partition write failures are never run-level errors; they are reported in
/// [`crate::SyncReport::failures`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The worker count was zero.
    #[error("synchronizer needs at least one worker")]
    ZeroWorkers,
    /// The worker pool could not be started.
    #[error("failed to start a pool of {workers} sync workers")]
    WorkerPool {
        /// Requested worker count.
        workers: usize,
        /// Error reported by `rayon`.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
    /// Loading the golden source failed.
    #[error("failed to load {kind} golden source")]
    Load {
        /// Kind being synchronized.
        kind: EntityKind,
        /// Loader failure.
        #[source]
        source: LoadError,
    },
    /// The partition configuration was rejected.
    #[error("invalid partition configuration for {kind}")]
    Partition {
        /// Kind being synchronized.
        kind: EntityKind,
        /// Partitioner failure.
        #[source]
        source: PartitionError,
    },
}

impl SyncError {
    /// Whether the run stopped on a malformed row under the abort policy.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Load {
                source: LoadError::Malformed { .. },
                ..
            }
        )
    }

    /// Whether the golden source could not be opened.
    #[must_use]
    pub const fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Load {
                source: LoadError::Source(
                    SourceError::Unavailable { .. } | SourceError::NotAFile { .. }
                ),
                ..
            }
        )
    }
}

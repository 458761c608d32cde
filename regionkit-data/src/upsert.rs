//! Upsert Executor: one partition, one atomic store write.

use log::{info, warn};
use regionkit_core::{EntityKind, ReferenceStore, StoreError};

use crate::partition::Partition;

/// Outcome of dispatching one partition.
#[derive(Debug)]
pub enum PartitionOutcome {
    /// The partition was written; carries the number of rows.
    Written(usize),
    /// The store rejected the write.
    Failed(PartitionFailure),
    /// Cancellation was observed before the write started.
    Cancelled,
}

/// A partition whose write failed. Sibling partitions are unaffected.
#[derive(Debug)]
pub struct PartitionFailure {
    /// Key of the failed partition.
    pub key: usize,
    /// Number of entities in the partition.
    pub size: usize,
    /// Error reported by the store.
    pub error: StoreError,
}

/// Apply one partition as a single idempotent write.
///
/// Store failures abort this partition only and are logged here, so the
/// caller can aggregate outcomes without re-reporting them.
pub fn apply_partition<S>(store: &S, kind: EntityKind, partition: &Partition<'_>) -> PartitionOutcome
where
    S: ReferenceStore + ?Sized,
{
    match store.upsert(kind, &partition.members) {
        Ok(rows) => {
            info!(
                "upserted {kind} partition {key} with {rows} rows",
                key = partition.key
            );
            PartitionOutcome::Written(rows)
        }
        Err(error) => {
            warn!(
                "failed to upsert {kind} partition {key} ({size} rows): {error}",
                key = partition.key,
                size = partition.len()
            );
            PartitionOutcome::Failed(PartitionFailure {
                key: partition.key,
                size: partition.len(),
                error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionkit_core::{Entity, test_support::MemoryStore};
    use rstest::rstest;

    #[rstest]
    fn writes_every_member() {
        let store = MemoryStore::default();
        let entities = [Entity::root("11", "Aceh"), Entity::root("12", "Sumut")];
        let partition = Partition {
            key: 3,
            members: entities.iter().collect(),
        };

        let outcome = apply_partition(&store, EntityKind::Region, &partition);
        assert!(matches!(outcome, PartitionOutcome::Written(2)));
        assert_eq!(store.count(EntityKind::Region).expect("count"), 2);
    }

    #[rstest]
    fn failing_write_reports_partition_and_leaves_store_untouched() {
        let store = MemoryStore::default().fail_on_id("12");
        let entities = [Entity::root("11", "Aceh"), Entity::root("12", "Sumut")];
        let partition = Partition {
            key: 9,
            members: entities.iter().collect(),
        };

        match apply_partition(&store, EntityKind::Region, &partition) {
            PartitionOutcome::Failed(failure) => {
                assert_eq!((failure.key, failure.size), (9, 2));
                assert!(matches!(failure.error, StoreError::WriteFailed { rows: 2, .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.count(EntityKind::Region).expect("count"), 0);
    }
}

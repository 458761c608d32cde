//! Batch Partitioner.
//!
//! [`PartitionStrategy::HashModulo`] shards entities by a hash of their
//! identifier. It bounds the number of partitions, not their size: many
//! identifiers colliding modulo the capacity land in one large partition.
//! [`PartitionStrategy::Chunked`] produces contiguous chunks of at most the
//! capacity instead.

use std::collections::BTreeMap;

use regionkit_core::Entity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default partition capacity.
pub const DEFAULT_PARTITION_CAPACITY: usize = 1000;

/// How entities are grouped into write units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// Group by `identifier_hash(id).rem_euclid(capacity)`.
    #[default]
    HashModulo,
    /// Contiguous chunks of at most `capacity` entities, in input order.
    Chunked,
}

/// A disjoint subset of the loaded entities, written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<'a> {
    /// Shard key for hash partitions, chunk index for chunked ones.
    pub key: usize,
    /// Members, in input order.
    pub members: Vec<&'a Entity>,
}

impl Partition<'_> {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the partition has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Errors raised for an unusable partition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// A capacity of zero cannot shard anything.
    #[error("partition capacity must be at least 1")]
    ZeroCapacity,
    /// The capacity does not fit the hash arithmetic.
    #[error("partition capacity {capacity} is too large")]
    CapacityTooLarge {
        /// Requested capacity.
        capacity: usize,
    },
}

/// Wrapping 31-polynomial hash over the UTF-16 code units of `id`.
///
/// # Examples
/// ```
/// use regionkit_data::identifier_hash;
///
/// assert_eq!(identifier_hash(""), 0);
/// assert_eq!(identifier_hash("11"), 1568);
/// ```
#[must_use]
pub fn identifier_hash(id: &str) -> i32 {
    id.encode_utf16().fold(0_i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    })
}

/// Split `entities` into partitions of the given `capacity`.
///
/// Every entity lands in exactly one partition and no partition is empty.
/// Hash partitions are returned ordered by key.
///
/// # Examples
/// ```
/// use regionkit_core::Entity;
/// use regionkit_data::{PartitionStrategy, partition};
///
/// let regions = vec![Entity::root("11", "Aceh"), Entity::root("12", "Sumut")];
/// let partitions = partition(&regions, 1000, PartitionStrategy::HashModulo).expect("partition");
/// assert_eq!(partitions.len(), 2);
/// ```
pub fn partition(
    entities: &[Entity],
    capacity: usize,
    strategy: PartitionStrategy,
) -> Result<Vec<Partition<'_>>, PartitionError> {
    if capacity == 0 {
        return Err(PartitionError::ZeroCapacity);
    }
    match strategy {
        PartitionStrategy::HashModulo => hash_partitions(entities, capacity),
        PartitionStrategy::Chunked => Ok(entities
            .chunks(capacity)
            .enumerate()
            .map(|(key, chunk)| Partition {
                key,
                members: chunk.iter().collect(),
            })
            .collect()),
    }
}

fn hash_partitions(
    entities: &[Entity],
    capacity: usize,
) -> Result<Vec<Partition<'_>>, PartitionError> {
    let too_large = || PartitionError::CapacityTooLarge { capacity };
    let modulus = i64::try_from(capacity).map_err(|_| too_large())?;

    let mut shards: BTreeMap<usize, Vec<&Entity>> = BTreeMap::new();
    for entity in entities {
        let remainder = i64::from(identifier_hash(&entity.id)).rem_euclid(modulus);
        let key = usize::try_from(remainder).map_err(|_| too_large())?;
        shards.entry(key).or_default().push(entity);
    }
    Ok(shards
        .into_iter()
        .map(|(key, members)| Partition { key, members })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::BTreeSet;

    fn regions(ids: &[&str]) -> Vec<Entity> {
        ids.iter().map(|id| Entity::root(*id, format!("Region {id}"))).collect()
    }

    #[rstest]
    #[case("11", 1568)]
    #[case("1101", 1_508_385)]
    #[case("Aa", 2112)]
    #[case("BB", 2112)]
    fn hash_matches_polynomial(#[case] id: &str, #[case] expected: i32) {
        assert_eq!(identifier_hash(id), expected);
    }

    #[rstest]
    fn hash_wraps_and_keys_stay_in_range() {
        let long = "9".repeat(40);
        assert_eq!(identifier_hash(&long), -671_277_440);

        let entities = regions(&[long.as_str(), "11"]);
        let partitions = partition(&entities, 7, PartitionStrategy::HashModulo).expect("partition");
        assert!(partitions.iter().all(|p| p.key < 7));
    }

    #[rstest]
    fn colliding_identifiers_share_one_unbounded_partition() {
        // "Aa" and "BB" share a hash, so they collide under any capacity.
        let entities = regions(&["Aa", "BB", "11"]);
        let partitions = partition(&entities, 1000, PartitionStrategy::HashModulo).expect("partition");
        let sizes: Vec<usize> = partitions.iter().map(Partition::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 3);
        assert!(sizes.contains(&2));
    }

    #[rstest]
    fn capacity_one_yields_single_partition() {
        let entities = regions(&["11", "12", "13"]);
        let partitions = partition(&entities, 1, PartitionStrategy::HashModulo).expect("partition");
        assert_eq!(partitions.len(), 1);
        let ids: Vec<&str> = partitions[0].members.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["11", "12", "13"]);
    }

    #[rstest]
    fn chunked_strategy_bounds_partition_size() {
        let entities = regions(&["11", "12", "13", "14", "15"]);
        let partitions = partition(&entities, 2, PartitionStrategy::Chunked).expect("partition");
        let sizes: Vec<usize> = partitions.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(partitions[2].members[0].id, "15");
    }

    #[rstest]
    #[case(PartitionStrategy::HashModulo)]
    #[case(PartitionStrategy::Chunked)]
    fn rejects_zero_capacity(#[case] strategy: PartitionStrategy) {
        assert_eq!(
            partition(&regions(&["11"]), 0, strategy),
            Err(PartitionError::ZeroCapacity)
        );
    }

    #[rstest]
    fn empty_input_yields_no_partitions() {
        let partitions = partition(&[], 1000, PartitionStrategy::HashModulo).expect("partition");
        assert!(partitions.is_empty());
    }

    proptest! {
        #[test]
        fn every_entity_lands_in_exactly_one_partition(
            ids in prop::collection::btree_set("[0-9]{2,10}", 0..200),
            capacity in 1_usize..64,
            chunked in any::<bool>(),
        ) {
            let entities: Vec<Entity> = ids.iter().map(|id| Entity::root(id.clone(), "x")).collect();
            let strategy = if chunked { PartitionStrategy::Chunked } else { PartitionStrategy::HashModulo };
            let partitions = partition(&entities, capacity, strategy).expect("partition");

            let mut seen = BTreeSet::new();
            for part in &partitions {
                prop_assert!(!part.is_empty());
                prop_assert!(part.key < capacity || chunked);
                for member in &part.members {
                    prop_assert!(seen.insert(member.id.clone()), "duplicate {}", member.id);
                }
            }
            prop_assert_eq!(seen, ids);
        }

        #[test]
        fn hash_partitioning_is_deterministic(
            ids in prop::collection::vec("[0-9]{2,10}", 0..100),
            capacity in 1_usize..1000,
        ) {
            let entities: Vec<Entity> = ids.iter().map(|id| Entity::root(id.clone(), "x")).collect();
            let first = partition(&entities, capacity, PartitionStrategy::HashModulo).expect("partition");
            let second = partition(&entities, capacity, PartitionStrategy::HashModulo).expect("partition");
            prop_assert_eq!(first, second);
        }
    }
}

//! Reference-data pipeline for the administrative-region hierarchy.
//!
//! Golden-source CSV files are loaded into typed entities, split into
//! partitions and upserted concurrently into a [`regionkit_core::ReferenceStore`].
//! The [`HierarchyQueryService`] answers hierarchical lookups and resyncs a
//! kind on demand when a lookup comes back empty.

#![forbid(unsafe_code)]

pub mod loader;
pub mod partition;
pub mod query;
pub mod response;
pub mod source;
pub mod sync;
pub mod upsert;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use loader::{
    LoadError, LoadReport, MalformedPolicy, MalformedReason, RejectedRow, load, load_from_reader,
};
pub use partition::{
    DEFAULT_PARTITION_CAPACITY, Partition, PartitionError, PartitionStrategy, identifier_hash,
    partition,
};
pub use query::{Found, HealPolicy, HierarchyQueryService, Lookup, QueryError};
pub use response::{Envelope, Reply, ResponseStatus, reply_entity, reply_import, reply_list};
pub use source::{DirectorySource, GoldenSource, SourceError};
pub use sync::{CancelToken, SyncConfig, SyncError, SyncReport, SyncState, Synchronizer};
pub use upsert::{PartitionFailure, PartitionOutcome, apply_partition};

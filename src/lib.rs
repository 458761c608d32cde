//! Facade crate for the regionkit administrative-region reference data.
//!
//! This crate re-exports the core hierarchy types and store contract, and
//! exposes the SQLite store and the sync pipeline behind feature flags.

#![forbid(unsafe_code)]

pub use regionkit_core::{
    Ancestor, Entity, EntityKind, InvalidIdentifier, KindSchema, REGION_CODE_RANGE,
    ReferenceStore, StoreError, UnknownKind, validate_identifier,
};

#[cfg(feature = "store-sqlite")]
pub use regionkit_core::{SchemaError, SqliteReferenceStore, SqliteStoreOptions};

#[cfg(feature = "pipeline")]
pub use regionkit_data::{
    CancelToken, DirectorySource, GoldenSource, HealPolicy, HierarchyQueryService,
    MalformedPolicy, PartitionStrategy, Reply, ResponseStatus, SyncConfig, SyncError, SyncReport,
    Synchronizer,
};

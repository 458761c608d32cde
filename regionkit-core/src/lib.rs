//! Core domain types for the regionkit reference-data engine.
//!
//! The crate models a four-level administrative hierarchy. Every level shares
//! one record shape ([`Entity`]) and is described by static metadata
//! ([`EntityKind`] and [`KindSchema`]), so storage and synchronization code is
//! written once and parameterised by kind.

#![forbid(unsafe_code)]

mod entity;
mod identifier;
mod kind;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use entity::{Ancestor, Entity};
pub use identifier::{InvalidIdentifier, REGION_CODE_RANGE, validate_identifier};
pub use kind::{EntityKind, KindSchema, UnknownKind};
pub use store::{ReferenceStore, StoreError};

#[cfg(feature = "store-sqlite")]
pub use store::{
    SCHEMA_VERSION, SchemaError, SqliteReferenceStore, SqliteStoreOptions, initialise_schema,
};

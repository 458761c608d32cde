//! Behavioural tests for `SqliteReferenceStore` using rstest-bdd.

use std::{cell::RefCell, path::PathBuf};

use regionkit_core::{
    Ancestor, Entity, EntityKind, ReferenceStore, SqliteReferenceStore, SqliteStoreOptions,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

/// Shared state for SQLite reference store scenarios.
#[derive(Debug)]
struct StoreWorld {
    temp_dir: TempDir,
    store: RefCell<Option<SqliteReferenceStore>>,
    results: RefCell<Vec<Entity>>,
}

impl StoreWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            store: RefCell::new(None),
            results: RefCell::new(Vec::new()),
        }
    }

    fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("regions.db")
    }

    fn open(&self) {
        let store = SqliteReferenceStore::open(self.database_path(), SqliteStoreOptions::default())
            .expect("open reference store");
        self.store.replace(Some(store));
    }

    fn with_store<T>(&self, action: impl FnOnce(&SqliteReferenceStore) -> T) -> T {
        let borrowed = self.store.borrow();
        let store = borrowed.as_ref().expect("store should be open");
        action(store)
    }
}

#[fixture]
fn world() -> StoreWorld {
    StoreWorld::new()
}

fn settlement() -> Entity {
    Entity::child("1101012001", "110101", "Latiung")
}

#[given("a SQLite reference store in a temporary directory")]
fn given_store(world: &StoreWorld) {
    world.open();
}

#[given("a hierarchy from region 11 down to one settlement")]
fn given_hierarchy(world: &StoreWorld) {
    world.with_store(|store| {
        let rows = [
            (EntityKind::Region, Entity::root("11", "Aceh")),
            (EntityKind::SubRegion, Entity::child("1101", "11", "Simeulue")),
            (EntityKind::District, Entity::child("110101", "1101", "Teupah Selatan")),
            (EntityKind::Settlement, settlement()),
        ];
        for (kind, entity) in &rows {
            store.upsert(*kind, &[entity]).expect("seed hierarchy");
        }
    });
}

#[when("I list settlements under region {region}")]
fn list_settlements(world: &StoreWorld, region: String) {
    let found = world.with_store(|store| {
        store
            .list_by_ancestor(EntityKind::Settlement, &Ancestor::region(region.trim()))
            .expect("list settlements")
    });
    world.results.replace(found);
}

#[when("the settlement is renamed and upserted again")]
fn rename_settlement(world: &StoreWorld) {
    let renamed = Entity::child("1101012001", "110101", "Latiung Baru");
    world.with_store(|store| {
        store
            .upsert(EntityKind::Settlement, &[&renamed])
            .expect("upsert renamed settlement");
    });
}

#[when("the store is reopened")]
fn reopen_store(world: &StoreWorld) {
    world.store.replace(None);
    world.open();
}

#[then("the settlement {id} is returned")]
fn then_settlement_returned(world: &StoreWorld, id: String) {
    let results = world.results.borrow();
    let ids: Vec<&str> = results.iter().map(|entity| entity.id.as_str()).collect();
    assert_eq!(ids, vec![id.trim()]);
}

#[then("no settlements are returned")]
fn then_no_settlements(world: &StoreWorld) {
    assert!(world.results.borrow().is_empty(), "expected no settlements");
}

#[then("the store holds one settlement with the new name")]
fn then_renamed(world: &StoreWorld) {
    world.with_store(|store| {
        assert_eq!(store.count(EntityKind::Settlement).expect("count"), 1);
        let found = store
            .find_by_id(EntityKind::Settlement, "1101012001")
            .expect("find settlement")
            .expect("settlement present");
        assert_eq!(found.name, "Latiung Baru");
        assert_eq!(found.parent_id, settlement().parent_id);
    });
}

#[then("every kind holds exactly one row")]
fn then_one_row_per_kind(world: &StoreWorld) {
    world.with_store(|store| {
        for kind in EntityKind::ALL {
            assert_eq!(store.count(kind).expect("count"), 1, "{kind} row count");
        }
    });
}

#[scenario(path = "tests/features/sqlite_reference_store.feature", index = 0)]
fn settlements_through_hierarchy(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_reference_store.feature", index = 1)]
fn unknown_region_is_empty(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_reference_store.feature", index = 2)]
fn upsert_updates_in_place(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_reference_store.feature", index = 3)]
fn rows_survive_reopen(world: StoreWorld) {
    let _ = world;
}

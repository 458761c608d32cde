//! Golden-source fixtures shared by the pipeline behaviour tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use regionkit_core::EntityKind;

/// Directory holding the bundled golden CSV files.
pub fn golden_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/golden")
}

/// Copy every bundled golden file into `target`.
pub fn stage_golden(target: &Path) {
    for kind in EntityKind::ALL {
        let name = kind.schema().source_file;
        let from = golden_dir().join(name);
        fs::copy(&from, target.join(name)).unwrap_or_else(|err| {
            panic!("failed to stage golden fixture {}: {err}", from.display());
        });
    }
}

/// Write `contents` as the golden file for `kind` in `target`.
pub fn write_golden(target: &Path, kind: EntityKind, contents: &str) {
    let path = target.join(kind.schema().source_file);
    fs::write(&path, contents).unwrap_or_else(|err| {
        panic!("failed to write golden fixture {}: {err}", path.display());
    });
}

//! Filesystem helpers for golden-source directories and database paths,
//! built on `cap-std` and `camino`.
#![forbid(unsafe_code)]

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;

/// What a golden-source directory holds under a given file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// A regular file is present.
    Present,
    /// Nothing exists under the name.
    Missing,
    /// Something exists but it is not a regular file.
    NotAFile,
}

/// Capability handle on a directory of golden-source files.
///
/// Files are resolved relative to the directory; names that would escape it
/// are refused by `cap-std`.
#[derive(Debug)]
pub struct SourceDir {
    dir: fs_utf8::Dir,
    root: Utf8PathBuf,
}

impl SourceDir {
    /// Open `root` using ambient authority.
    pub fn open_ambient(root: &Utf8Path) -> io::Result<Self> {
        let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
        Ok(Self {
            dir,
            root: root.to_path_buf(),
        })
    }

    /// Directory this handle was opened on.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Display path of `name` inside the directory.
    #[must_use]
    pub fn path_of(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Open `name` for reading.
    pub fn open(&self, name: &str) -> io::Result<fs_utf8::File> {
        self.dir.open(name)
    }

    /// Report whether `name` is a regular file in the directory.
    pub fn status(&self, name: &str) -> io::Result<FileStatus> {
        match self.dir.metadata(name) {
            Ok(meta) if meta.is_file() => Ok(FileStatus::Present),
            Ok(_) => Ok(FileStatus::NotAFile),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(FileStatus::Missing),
            Err(err) => Err(err),
        }
    }
}

/// Create every missing directory above `path`, such as the folder that will
/// hold a SQLite database file.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_anchor(parent);
    if relative.as_str().is_empty() {
        return Ok(());
    }
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    dir.create_dir_all(&relative)
}

/// Split a path into the directory it is anchored on (a drive prefix, the
/// filesystem root, or the current directory) and the remainder below it.
fn split_anchor(path: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let mut base = Utf8PathBuf::new();
    let mut relative = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => base.push(component),
            other => relative.push(other),
        }
    }
    if base.as_str().is_empty() {
        base.push(".");
    }
    (base, relative)
}

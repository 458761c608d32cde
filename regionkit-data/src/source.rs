//! Golden-source access.
//!
//! A [`GoldenSource`] hands the loader one readable stream per entity kind.
//! [`DirectorySource`] serves the bundled CSV files from a directory.

use std::{io, io::Read, sync::Arc};

use camino::Utf8Path;
use regionkit_core::EntityKind;
use regionkit_fs::{FileStatus, SourceDir};
use thiserror::Error;

/// Provider of golden-source CSV streams.
pub trait GoldenSource: Send + Sync {
    /// Open the golden-source stream for `kind`.
    fn open(&self, kind: EntityKind) -> Result<Box<dyn Read + Send>, SourceError>;

    /// Human-readable location of the stream for `kind`, used in logs and
    /// error messages.
    fn describe(&self, kind: EntityKind) -> String;
}

impl<G: GoldenSource + ?Sized> GoldenSource for Arc<G> {
    fn open(&self, kind: EntityKind) -> Result<Box<dyn Read + Send>, SourceError> {
        (**self).open(kind)
    }

    fn describe(&self, kind: EntityKind) -> String {
        (**self).describe(kind)
    }
}

/// Errors raised when a golden-source stream cannot be provided.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The golden-source file is missing or unreadable.
    #[error("golden source for {kind} is unavailable at {location}")]
    Unavailable {
        /// Kind whose stream was requested.
        kind: EntityKind,
        /// Location of the stream.
        location: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The location exists but is not a regular file.
    #[error("golden source for {kind} at {location} is not a regular file")]
    NotAFile {
        /// Kind whose stream was requested.
        kind: EntityKind,
        /// Location of the stream.
        location: String,
    },
}

/// Golden source backed by a directory holding one CSV file per kind.
///
/// File names come from [`regionkit_core::KindSchema::source_file`].
#[derive(Debug)]
pub struct DirectorySource {
    dir: SourceDir,
}

impl DirectorySource {
    /// Open the directory at `root`.
    pub fn open_ambient(root: &Utf8Path) -> Result<Self, io::Error> {
        Ok(Self {
            dir: SourceDir::open_ambient(root)?,
        })
    }

    /// Directory the source reads from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.dir.root()
    }
}

impl GoldenSource for DirectorySource {
    fn open(&self, kind: EntityKind) -> Result<Box<dyn Read + Send>, SourceError> {
        let name = kind.schema().source_file;
        let unavailable = |source| SourceError::Unavailable {
            kind,
            location: self.describe(kind),
            source,
        };
        match self.dir.status(name).map_err(unavailable)? {
            FileStatus::Present => {}
            FileStatus::NotAFile => {
                return Err(SourceError::NotAFile {
                    kind,
                    location: self.describe(kind),
                });
            }
            FileStatus::Missing => {
                return Err(unavailable(io::Error::from(io::ErrorKind::NotFound)));
            }
        }
        let file = self.dir.open(name).map_err(unavailable)?;
        Ok(Box::new(file))
    }

    fn describe(&self, kind: EntityKind) -> String {
        self.dir.path_of(kind.schema().source_file).into_string()
    }
}

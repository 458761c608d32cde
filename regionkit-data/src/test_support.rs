//! Shared fixtures for pipeline tests.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    io::{self, Cursor, Read},
    sync::{
        Once,
        atomic::{AtomicUsize, Ordering},
    },
};

use log::{Level, LevelFilter, Log, Metadata, Record};
use regionkit_core::EntityKind;

use crate::source::{GoldenSource, SourceError};

/// Stub [`GoldenSource`] serving in-memory CSV text.
///
/// Kinds without registered text behave like a missing file.
#[derive(Debug, Default)]
pub struct StubSource {
    files: BTreeMap<EntityKind, String>,
    opens: AtomicUsize,
}

impl StubSource {
    /// Register the CSV text served for `kind`.
    #[must_use]
    pub fn with(mut self, kind: EntityKind, csv: impl Into<String>) -> Self {
        self.files.insert(kind, csv.into());
        self
    }

    /// Number of successful and failed `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl GoldenSource for StubSource {
    fn open(&self, kind: EntityKind) -> Result<Box<dyn Read + Send>, SourceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.files.get(&kind) {
            Some(csv) => Ok(Box::new(Cursor::new(csv.clone().into_bytes()))),
            None => Err(SourceError::Unavailable {
                kind,
                location: self.describe(kind),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }

    fn describe(&self, kind: EntityKind) -> String {
        format!("stub://{}", kind.schema().source_file)
    }
}

/// A log record observed by [`capture_logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    /// Record severity.
    pub level: Level,
    /// Formatted message.
    pub message: String,
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<CapturedLog>>> = const { RefCell::new(None) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        CAPTURED.with(|slot| {
            if let Some(records) = slot.borrow_mut().as_mut() {
                records.push(CapturedLog {
                    level: record.level(),
                    message: record.args().to_string(),
                });
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Run `action` and return what it logged on the calling thread.
///
/// The first call installs a process-wide logger. Records from worker
/// threads are not captured.
pub fn capture_logs<T>(action: impl FnOnce() -> T) -> (T, Vec<CapturedLog>) {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|slot| *slot.borrow_mut() = Some(Vec::new()));
    let value = action();
    let records = CAPTURED.with(|slot| slot.take()).unwrap_or_default();
    (value, records)
}

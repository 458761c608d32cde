//! Cooperative cancellation for a synchronization run.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag asking a run to stop dispatching partitions.
///
/// Partitions already being written complete normally; those not yet
/// started are reported as cancelled and left untouched.
///
/// # Examples
/// ```
/// use regionkit_data::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

//! Cooperative cancellation for document-processing runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag checked between units of work.
///
/// Cancelling stops further chunk enrichment and further batch writes.
/// Batches already written stay in the index.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next run can proceed.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//! Cancellation handle for periodic work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle to work scheduled with
/// [`SerialExecutor::run_periodically`](super::SerialExecutor::run_periodically).
///
/// Cancellation is cooperative: a firing already running completes, and no
/// firing starts after `cancel` returns.
#[derive(Clone, Debug)]
pub struct PeriodicTask {
    active: Arc<AtomicBool>,
}

impl PeriodicTask {
    pub(crate) fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

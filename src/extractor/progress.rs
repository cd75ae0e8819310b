//! Completion counting for a scan.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Called with `(parsed, total)` after each extraction task completes.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Shared completion counter for one scan.
///
/// `total` is fixed at construction. Each [`complete_one`](Self::complete_one)
/// bumps `parsed` and notifies the listener; the increment and the call
/// happen under one lock so listeners observe a non-decreasing sequence
/// even when tasks finish on different threads.
pub struct Progress {
    parsed: AtomicUsize,
    total: usize,
    listener: Option<ProgressCallback>,
    notify: Mutex<()>,
}

impl Progress {
    pub fn new(total: usize, listener: Option<ProgressCallback>) -> Self {
        Self {
            parsed: AtomicUsize::new(0),
            total,
            listener,
            notify: Mutex::new(()),
        }
    }

    /// Record one finished task. Returns the new parsed count.
    pub fn complete_one(&self) -> usize {
        let _guard = self.notify.lock();
        let parsed = self.parsed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(listener) = &self.listener {
            listener(parsed, self.total);
        }
        parsed
    }

    pub fn parsed(&self) -> usize {
        self.parsed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.parsed() >= self.total
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("parsed", &self.parsed())
            .field("total", &self.total)
            .finish()
    }
}

//! Cooperative progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Receives progress notifications from long-running operations.
///
/// Cancellation is advisory: operations poll [`ProgressListener::is_canceled`]
/// between discrete units of work and stop at the next boundary.
pub trait ProgressListener: Send + Sync {
    fn started(&self) {}

    /// Report progress, either a percentage or a count of processed units.
    fn set_progress(&self, _progress: f32) {}

    fn progress(&self) -> f32 {
        0.0
    }

    fn complete(&self) {}

    fn is_completed(&self) -> bool {
        false
    }

    fn cancel(&self) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Listener that ignores every notification and is never canceled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgressListener;

impl ProgressListener for NullProgressListener {}

/// Listener that records progress and honours [`ProgressListener::cancel`].
#[derive(Debug, Default)]
pub struct DefaultProgressListener {
    canceled: AtomicBool,
    completed: AtomicBool,
    progress: AtomicU32,
}

impl DefaultProgressListener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressListener for DefaultProgressListener {
    fn started(&self) {
        self.completed.store(false, Ordering::SeqCst);
        self.progress.store(0f32.to_bits(), Ordering::SeqCst);
    }

    fn set_progress(&self, progress: f32) {
        self.progress.store(progress.to_bits(), Ordering::SeqCst);
    }

    fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::SeqCst))
    }

    fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

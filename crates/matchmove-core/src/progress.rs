//! Progress sinks backed by shared atomic state.

use crate::traits::ProgressSink;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Progress sink whose cancellation flag can be raised from another thread.
///
/// The solve itself is single-threaded; this only shares the "interrupt
/// requested" bit and the latest progress value with the outside world.
#[derive(Debug, Default, Clone)]
pub struct SharedInterrupt {
    cancel: Arc<AtomicBool>,
    progress: Arc<AtomicUsize>,
}

impl SharedInterrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that can be moved to another thread to request cancellation.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request that the running solve stops at its next evaluation.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Most recently reported progress value.
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }
}

impl ProgressSink for SharedInterrupt {
    fn set_progress(&mut self, value: usize) {
        self.progress.store(value, Ordering::Relaxed);
    }

    fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_crosses_clones() {
        let sink = SharedInterrupt::new();
        let handle = sink.cancel_handle();
        assert!(!sink.is_cancel_requested());
        handle.store(true, Ordering::Relaxed);
        assert!(sink.is_cancel_requested());
    }
}

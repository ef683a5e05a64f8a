//! Cooperative cancellation tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared cancellation flag tagged with `(file, version)`.
///
/// Cancellation is cooperative and observed at task boundaries: a running
/// task completes, but its reply is suppressed when the token tripped.
/// Tokens trip on either a newer version enqueued for the same file or an
/// explicit client cancel.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    /// File the task targets.
    pub file: String,
    /// Version the task was enqueued against.
    pub version: i64,
}

impl CancellationToken {
    /// Create a live token.
    pub fn new(file: impl Into<String>, version: i64) -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), file: file.into(), version }
    }

    /// Trip the token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Relaxed read; hot paths may poll this freely.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new("/p/a.cj", 3);
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}

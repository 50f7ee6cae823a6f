//! Cooperative cancellation and progress reporting
//!
//! Long-running stages poll a [`CancellationToken`] at every parallel-loop iteration and
//! every solver iteration. Progress is forwarded through a [`ProgressTracker`] which keeps
//! the reported percentage non-decreasing.

use crate::error::{PoreNetworkError, Result};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
///
/// Clones observe the same flag, so a caller keeps one clone and hands another
/// to the generator or simulator.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every operation observing this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` once cancellation has been requested.
    ///
    /// # Errors
    /// [`PoreNetworkError::Cancelled`] if the token was cancelled.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PoreNetworkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receiver for integer percentage progress updates.
pub trait ProgressSink: Send + Sync {
    /// Called with a percentage in `0..=100`.
    fn report(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent);
    }
}

/// Progress sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Wraps a sink and drops any update that would move progress backwards.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: AtomicU8,
}

impl<'a> ProgressTracker<'a> {
    /// Wrap `sink`.
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    /// Forward `percent` (clamped to 100) if it does not go below the last value sent.
    pub fn milestone(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent >= previous {
            self.sink.report(percent);
        }
    }

    /// Last percentage forwarded.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_token_clones_share_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());

        token.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(observer.check(), Err(PoreNetworkError::Cancelled));
    }

    #[test]
    fn test_tracker_is_monotonic() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let tracker = ProgressTracker::new(&sink);

        tracker.milestone(10);
        tracker.milestone(30);
        tracker.milestone(20);
        tracker.milestone(30);
        tracker.milestone(250);

        assert_eq!(*seen.lock().unwrap(), vec![10, 30, 30, 100]);
        assert_eq!(tracker.current(), 100);
    }
}

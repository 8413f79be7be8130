//! Cooperative cancellation for long diff computations.

use crate::error::DiffError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A cloneable cancellation flag with an optional deadline.
///
/// Clones share the flag, so a caller can keep one clone and cancel work
/// running on a worker pool. The deadline bounds the LCS pass itself; the flag
/// is polled between files and between phases of a single file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns `Err(DiffError::Cancelled)` once cancelled or past the deadline.
    #[inline]
    pub fn check(&self) -> Result<(), DiffError> {
        if self.is_cancelled() {
            Err(DiffError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_live() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        assert!(token.deadline().is_none());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let worker = token.clone();
        token.cancel();
        assert_eq!(worker.check(), Err(DiffError::Cancelled));
    }

    #[test]
    fn past_deadline_cancels() {
        let token = CancellationToken::new().with_deadline(Instant::now());
        assert!(token.is_cancelled());
    }

    #[test]
    fn generous_timeout_stays_live() {
        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}

//! Cooperative cancellation for training runs.
//!
//! The trainer polls a [`CancellationToken`] between stages and between
//! tasks; a cancelled run stops at the next boundary with
//! [`AgriLearningError::Cancelled`](crate::AgriLearningError::Cancelled).
//!
//! # Example
//!
//! ```
//! use agrisense_learning::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(token.check().is_ok());
//!
//! token.cancel();
//! assert!(token.is_cancelled());
//! assert!(token.check().is_err());
//!
//! token.reset();
//! assert!(!token.is_cancelled());
//! ```

use crate::error::{AgriLearningError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A token that signals cancellation of a training run.
///
/// Clones share state, so a token handed to the trainer can be cancelled from
/// another thread (for example a Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    /// Creates a token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can drive another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    ///
    /// Intended for `?` at stage boundaries.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AgriLearningError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::default();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
        assert!(matches!(token2.check(), Err(AgriLearningError::Cancelled)));
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_thread_safe() {
        use std::thread;

        let token = CancellationToken::new();
        let token_clone = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            token_clone.cancel();
        });

        for _ in 0..200 {
            if token.is_cancelled() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(1));
        }
        handle.join().unwrap();

        assert!(token.is_cancelled());
    }
}

//! Cancellation handles for result streams.
//!
//! A [`CancelHandle`] is a single-fire signal shared between the task draining
//! a stream and whoever observes the transport (a close-event watcher, a
//! failed write). It is `Clone + Send + Sync`, so `cancel()` may be called
//! from any task while the draining loop is suspended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a new, unfired handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Idempotent. Returns `true` only for the call that actually fired the
    /// signal, so callers can tell a first cancellation from a repeat.
    pub fn cancel(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        if first {
            self.token.cancel();
        }
        first
    }

    /// Checks if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

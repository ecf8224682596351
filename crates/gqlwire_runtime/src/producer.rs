//! Pull-based, cancellable result producer.
//!
//! [`ResultProducer`] turns an upstream [`ResultStream`] into an explicit
//! `next()`/`cancel()` sequence. It exclusively owns the upstream source and
//! drops it exactly once: on exhaustion (or [`ResultProducer::finish`]),
//! after a fatal producer error, or when cancellation is first observed.
//!
//! Cancellation may come from two places:
//! - [`ResultProducer::cancel`], from the owning task. The source is released
//!   before the call returns.
//! - [`CancelHandle::cancel`], from any other task. A `next()` that is parked
//!   on the source wakes immediately and releases it; otherwise the source is
//!   released at the start of the following `next()`.
//!
//! In both cases no item is yielded once the signal has fired.

use crate::cancel::CancelHandle;
use crate::streaming::{Payload, ProducerError, ResultStream};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

/// Why a producer stopped yielding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The upstream source ran out.
    Exhausted,
    /// The upstream source raised a fatal error.
    Failed,
    /// Cancellation was requested.
    Cancelled,
}

/// A cancellable, ordered sequence of payloads.
pub struct ResultProducer<T> {
    source: Option<ResultStream<T>>,
    cancel: CancelHandle,
    pulled: usize,
    termination: Option<Termination>,
}

impl<T: Payload> ResultProducer<T> {
    /// Wraps an upstream source.
    pub fn new(source: ResultStream<T>) -> Self {
        Self {
            source: Some(source),
            cancel: CancelHandle::new(),
            pulled: 0,
            termination: None,
        }
    }

    /// Wraps any `Send` stream of results.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, ProducerError>> + Send + 'static,
    {
        Self::new(stream.boxed())
    }

    /// Returns a handle that cancels this producer from any task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Suspends until the next payload is available.
    ///
    /// Returns `None` once the source is exhausted, has failed fatally, or
    /// cancellation has fired. Payloads are yielded in upstream order and
    /// never twice.
    pub async fn next(&mut self) -> Option<T> {
        let source = self.source.as_mut()?;

        let pulled = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            item = source.next() => Some(item),
        };

        match pulled {
            None => {
                self.release(Termination::Cancelled);
                None
            }
            Some(None) => {
                self.release(Termination::Exhausted);
                None
            }
            Some(Some(Ok(item))) => {
                self.pulled += 1;
                Some(item)
            }
            Some(Some(Err(error))) => {
                self.pulled += 1;
                warn!(fatal = error.fatal, "producer error: {}", error);
                let payload = T::from_producer_error(&error);
                if error.fatal {
                    self.release(Termination::Failed);
                }
                Some(payload)
            }
        }
    }

    /// Cancels the producer and releases the upstream source.
    ///
    /// Safe to call repeatedly and after natural exhaustion. Returns `true`
    /// if this call fired the cancellation signal.
    pub fn cancel(&mut self) -> bool {
        let fired = self.cancel.cancel();
        self.release(Termination::Cancelled);
        fired
    }

    /// Ends the sequence after a final payload and releases the source.
    ///
    /// Used when the payload itself marks the end (`hasNext: false`) while
    /// the upstream is still open. Recorded as [`Termination::Exhausted`].
    pub fn finish(&mut self) {
        self.release(Termination::Exhausted);
    }

    /// Returns true once no further payload will be yielded.
    pub fn is_done(&self) -> bool {
        self.source.is_none() || self.cancel.is_cancelled()
    }

    /// How the producer ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Number of items pulled from the upstream source.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    fn release(&mut self, reason: Termination) {
        if let Some(source) = self.source.take() {
            drop(source);
            self.termination = Some(reason);
            debug!(?reason, pulled = self.pulled, "released upstream source");
        }
    }
}

impl<T> std::fmt::Debug for ResultProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultProducer")
            .field("live", &self.source.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("pulled", &self.pulled)
            .field("termination", &self.termination)
            .finish()
    }
}

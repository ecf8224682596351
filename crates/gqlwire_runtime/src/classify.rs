//! Response classification: picks the delivery mode for an execution outcome.

use crate::producer::ResultProducer;
use crate::result::ExecutionResult;
use crate::streaming::{IncrementalChunk, ResultStream};

const STATUS_OK: u16 = 200;
const STATUS_INTERNAL_ERROR: u16 = 500;

/// The kind of operation that was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// What the execution layer hands to the delivery engine.
pub enum ExecutionOutcome {
    /// A completed query or mutation result.
    Response(ExecutionResult),
    /// Execution setup failed (parse or validation). The status is chosen by
    /// the execution layer.
    Rejected { status: u16, result: ExecutionResult },
    /// A query or mutation with active `@defer`/`@stream`.
    Incremental(ResultStream<IncrementalChunk>),
    /// A subscription operation.
    Subscription(ResultStream<ExecutionResult>),
}

impl std::fmt::Debug for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response(result) => f.debug_tuple("Response").field(result).finish(),
            Self::Rejected { status, result } => f
                .debug_struct("Rejected")
                .field("status", status)
                .field("result", result)
                .finish(),
            Self::Incremental(_) => f.write_str("Incremental(..)"),
            Self::Subscription(_) => f.write_str("Subscription(..)"),
        }
    }
}

/// How a response is delivered. Selected once per request.
#[derive(Debug)]
pub enum DeliveryMode {
    /// One JSON body with the given status.
    Single { status: u16, result: ExecutionResult },
    /// `multipart/mixed` incremental delivery.
    Multipart(ResultProducer<IncrementalChunk>),
    /// `text/event-stream` delivery.
    EventStream(ResultProducer<ExecutionResult>),
}

/// Payload-free view of a [`DeliveryMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Single,
    Multipart,
    EventStream,
}

impl DeliveryKind {
    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multipart => "multipart",
            Self::EventStream => "event-stream",
        }
    }
}

impl std::fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeliveryMode {
    /// Returns the payload-free kind of this mode.
    pub fn kind(&self) -> DeliveryKind {
        match self {
            Self::Single { .. } => DeliveryKind::Single,
            Self::Multipart(_) => DeliveryKind::Multipart,
            Self::EventStream(_) => DeliveryKind::EventStream,
        }
    }
}

/// Maps an execution outcome to its delivery mode.
pub fn classify(outcome: ExecutionOutcome) -> DeliveryMode {
    match outcome {
        ExecutionOutcome::Response(result) => DeliveryMode::Single {
            status: status_for(&result),
            result,
        },
        ExecutionOutcome::Rejected { status, result } => DeliveryMode::Single { status, result },
        ExecutionOutcome::Incremental(stream) => {
            DeliveryMode::Multipart(ResultProducer::new(stream))
        }
        ExecutionOutcome::Subscription(stream) => {
            DeliveryMode::EventStream(ResultProducer::new(stream))
        }
    }
}

/// HTTP status for a completed single result.
pub fn status_for(result: &ExecutionResult) -> u16 {
    if result.is_failure() {
        STATUS_INTERNAL_ERROR
    } else {
        STATUS_OK
    }
}

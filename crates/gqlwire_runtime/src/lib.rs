//! Runtime for the gqlwire incremental delivery engine.
//!
//! This crate provides the transport-independent half of delivery:
//! - `result`: Terminal execution results and GraphQL errors
//! - `streaming`: @defer/@stream chunks and upstream result streams
//! - `cancel`: Single-fire cancellation handles
//! - `producer`: Pull-based, cancellable result producer
//! - `classify`: Delivery mode selection

pub mod cancel;
pub mod classify;
pub mod producer;
pub mod result;
pub mod streaming;

pub use cancel::CancelHandle;
pub use classify::{classify, DeliveryKind, DeliveryMode, ExecutionOutcome, OperationKind};
pub use producer::{ResultProducer, Termination};
pub use result::{ExecutionResult, GraphQLError};
pub use streaming::{
    IncrementalChunk, IncrementalChunkBuilder, PathSegment, Payload, ProducerError, ResultStream,
};

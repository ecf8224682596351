//! gqlwire SDK
//!
//! Serves GraphQL over HTTP with incremental delivery. An [`Executor`]
//! produces an [`ExecutionOutcome`]; the server answers with one of three
//! framings:
//!
//! - a single `application/json` body,
//! - `multipart/mixed` parts for `@defer`/`@stream`,
//! - `text/event-stream` events for subscriptions.
//!
//! Streamed responses are written with backpressure and are cancelled as
//! soon as the client disconnects.
//!
//! # Example
//!
//! ```ignore
//! use gqlwire_sdk::{GqlServer, ServerConfig, GraphQLRequest};
//! use gqlwire_runtime::{ExecutionOutcome, ExecutionResult};
//!
//! let server = GqlServer::builder()
//!     .config(ServerConfig::new().port(4000))
//!     .executor(|request: GraphQLRequest| {
//!         ExecutionOutcome::Response(ExecutionResult::data(serde_json::json!({"ok": true})))
//!     })
//!     .build()?;
//!
//! server.listen().await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod http;
pub mod request;
pub mod server;
pub mod streaming;
pub mod transport;
pub mod watcher;

pub use dispatch::{DeliveryEnd, DeliveryReport, DispatchState, Dispatched, Dispatcher};
pub use error::{ErrorCode, ResultExt, SdkError, SdkResult};
pub use executor::Executor;
pub use request::GraphQLRequest;
pub use server::{GqlServer, ServerBuilder, ServerConfig};
pub use streaming::{EventStreamFramer, Framer, MultipartFramer};
pub use transport::{body_channel, BodySender, BoxBody, CloseSignal, ResponseBody};
pub use watcher::ConnectionWatcher;

// Re-export runtime types that are commonly needed
pub use gqlwire_runtime::{
    CancelHandle, DeliveryKind, ExecutionOutcome, ExecutionResult, GraphQLError,
    IncrementalChunk, OperationKind, PathSegment, ProducerError, ResultProducer, ResultStream,
};

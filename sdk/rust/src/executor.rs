//! The execution layer seam.
//!
//! Schema construction, parsing, validation and resolvers live behind this
//! trait. The delivery engine only sees the [`ExecutionOutcome`] it returns.

use crate::request::GraphQLRequest;
use async_trait::async_trait;
use gqlwire_runtime::ExecutionOutcome;

/// Executes GraphQL requests.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Parses, validates and starts execution of a request.
    ///
    /// Parse and validation failures are reported as
    /// [`ExecutionOutcome::Rejected`].
    async fn execute(&self, request: GraphQLRequest) -> ExecutionOutcome;
}

#[async_trait]
impl<F> Executor for F
where
    F: Fn(GraphQLRequest) -> ExecutionOutcome + Send + Sync,
{
    async fn execute(&self, request: GraphQLRequest) -> ExecutionOutcome {
        self(request)
    }
}

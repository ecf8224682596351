//! gqlwire server.
//!
//! Wires an [`Executor`] to the HTTP endpoint and the response dispatcher.

use crate::dispatch::Dispatcher;
use crate::error::{SdkError, SdkResult};
use crate::executor::Executor;
use crate::transport::DEFAULT_BODY_CAPACITY;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Default cap on request bodies and GET query strings (1 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Path of the GraphQL endpoint.
    pub endpoint: String,
    /// Serve the playground page on browser GETs.
    pub playground: bool,
    /// Frames buffered per streaming response.
    pub body_capacity: usize,
    /// Largest accepted request body or query string, in bytes.
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            port: 4000,
            host: "127.0.0.1".to_string(),
            endpoint: "/graphql".to_string(),
            playground: true,
            body_capacity: DEFAULT_BODY_CAPACITY,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the endpoint path.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Disables the playground.
    pub fn no_playground(mut self) -> Self {
        self.playground = false;
        self
    }

    /// Sets the number of frames buffered per streaming response.
    pub fn body_capacity(mut self, capacity: usize) -> Self {
        self.body_capacity = capacity;
        self
    }

    /// Sets the largest accepted request body or query string.
    pub fn max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit;
        self
    }

    fn validate(&self) -> SdkResult<()> {
        if !self.endpoint.starts_with('/') {
            return Err(SdkError::internal(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }
        if self.body_capacity == 0 {
            return Err(SdkError::internal("body capacity must be at least 1"));
        }
        if self.max_request_bytes == 0 {
            return Err(SdkError::internal("request limit must be at least 1 byte"));
        }
        Ok(())
    }
}

/// Builder for [`GqlServer`].
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    executor: Option<Arc<dyn Executor>>,
}

impl ServerBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the execution layer.
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Builds the server.
    pub fn build(self) -> SdkResult<GqlServer> {
        self.config.validate()?;
        let executor = self
            .executor
            .ok_or_else(|| SdkError::internal("no executor configured"))?;

        Ok(GqlServer {
            dispatcher: Dispatcher::new(self.config.body_capacity),
            config: self.config,
            executor,
        })
    }
}

/// The gqlwire server.
pub struct GqlServer {
    config: ServerConfig,
    executor: Arc<dyn Executor>,
    dispatcher: Dispatcher,
}

impl GqlServer {
    /// Creates a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts the server and runs until Ctrl-C.
    ///
    /// Handles:
    /// - GET|POST {endpoint} - GraphQL operations
    /// - GET {endpoint} - Playground page (if enabled)
    /// - GET /health - Health check endpoint
    pub async fn listen(self) -> SdkResult<()> {
        self.listen_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Starts the server and runs until `shutdown` resolves.
    pub async fn listen_with_shutdown(self, shutdown: impl Future<Output = ()>) -> SdkResult<()> {
        let listener = crate::http::bind(&self.config).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// The configured host and port are ignored.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> SdkResult<()> {
        crate::http::serve(Arc::new(self), listener, shutdown).await
    }
}

impl std::fmt::Debug for GqlServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GqlServer")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

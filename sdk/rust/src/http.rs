//! Built-in HTTP server for gqlwire.
//!
//! This module provides the HTTP surface:
//! - GET|POST {endpoint} - GraphQL operations (single, multipart or SSE)
//! - GET {endpoint} - Playground UI for browsers
//! - GET /health - Health check
//! - OPTIONS {endpoint} - CORS preflight

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::dispatch::{build_response, json_error_response};
use crate::error::{ErrorCode, ResultExt, SdkError, SdkResult};
use crate::request::GraphQLRequest;
use crate::server::{GqlServer, ServerConfig};
use crate::transport::{full, BoxBody};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Routes one request.
pub async fn handle<B>(server: &GqlServer, req: Request<B>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let config = server.config();
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();

    if path == config.endpoint {
        let mut response = match parts.method {
            Method::GET | Method::POST => handle_graphql_request(server, &parts, body).await,
            Method::OPTIONS => preflight_response(),
            _ => error_response(&SdkError::new(
                ErrorCode::MethodNotAllowed,
                "GraphQL only supports GET and POST requests.",
            )),
        };
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        return response;
    }

    match (&parts.method, path) {
        (&Method::GET, "/health") => build_response(
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json"),
            full(health_response()),
        ),
        _ => build_response(
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header("Content-Type", "application/json"),
            full(r#"{"error":"Not Found"}"#),
        ),
    }
}

async fn handle_graphql_request<B>(server: &GqlServer, parts: &Parts, body: B) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let request = match read_request(server, parts, body).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            return build_response(
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "text/html; charset=utf-8"),
                full(playground_html(&server.config().endpoint)),
            );
        }
        Err(e) => {
            if e.is_client_error() {
                debug!(error = %e, "rejected request");
            } else {
                warn!(error = %e, "failed to read request");
            }
            return error_response(&e);
        }
    };

    debug!(
        "Executing query: {}",
        request.query.chars().take(100).collect::<String>()
    );

    let started = Instant::now();
    let outcome = server.executor().execute(request).await;
    let dispatched = server.dispatcher().dispatch(outcome);
    debug!(
        elapsed = ?started.elapsed(),
        status = dispatched.response.status().as_u16(),
        "executed"
    );
    dispatched.response
}

/// Extracts GraphQL parameters. `Ok(None)` means "render the playground".
async fn read_request<B>(
    server: &GqlServer,
    parts: &Parts,
    body: B,
) -> SdkResult<Option<GraphQLRequest>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let limit = server.config().max_request_bytes;

    if parts.method == Method::POST {
        let bytes: Bytes = Limited::new(body, limit)
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    SdkError::new(ErrorCode::PayloadTooLarge, "Request body too large.")
                } else {
                    SdkError::bad_request(format!("Failed to read body: {}", e))
                }
            })?;
        return GraphQLRequest::from_json_body(&bytes).map(Some);
    }

    let raw = parts.uri.query().unwrap_or_default();
    if raw.len() > limit {
        return Err(SdkError::new(
            ErrorCode::PayloadTooLarge,
            "Query string too large.",
        ));
    }
    let query = GraphQLRequest::from_query_string(raw)?;
    match query {
        Some(request) => Ok(Some(request)),
        None if server.config().playground && accepts_html(parts) => Ok(None),
        None => Err(SdkError::bad_request("Must provide query string.")),
    }
}

fn accepts_html(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn error_response(err: &SdkError) -> Response<BoxBody> {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_error_response(status, &err.message)
}

fn preflight_response() -> Response<BoxBody> {
    build_response(
        Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type, Accept"),
        full(""),
    )
}

pub(crate) fn playground_html(endpoint: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>gqlwire Playground</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 900px; margin: 0 auto; padding: 2rem; }}
        pre {{ background: #1e293b; color: #e2e8f0; padding: 1rem; border-radius: 6px; overflow-x: auto; }}
    </style>
</head>
<body>
    <h1>gqlwire</h1>
    <ul>
        <li><code>POST {endpoint}</code> - queries, mutations, <code>@defer</code>/<code>@stream</code> (multipart/mixed)</li>
        <li><code>POST {endpoint}</code> - subscriptions (text/event-stream)</li>
        <li><code>GET /health</code> - health check</li>
    </ul>
    <pre>curl -N http://localhost:4000{endpoint} \
  -H "Content-Type: application/json" \
  -d '{{"query": "subscription {{ clock }}"}}'</pre>
</body>
</html>"#,
        endpoint = endpoint
    )
}

pub(crate) fn health_response() -> &'static str {
    r#"{"status":"healthy"}"#
}

/// Binds the configured address.
pub(crate) async fn bind(config: &ServerConfig) -> SdkResult<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_sdk_err_with(ErrorCode::BindError, "Invalid address")?;

    TcpListener::bind(addr)
        .await
        .map_sdk_err_with(ErrorCode::BindError, "Failed to bind")
}

/// Accepts connections until `shutdown` resolves.
///
/// Every connection is served on its own task.
pub(crate) async fn serve(
    server: Arc<GqlServer>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> SdkResult<()> {
    let addr = listener
        .local_addr()
        .map_sdk_err_with(ErrorCode::BindError, "Listener has no address")?;
    info!("Listening on http://{}{}", addr, server.config().endpoint);

    tokio::pin!(shutdown);
    loop {
        let (stream, remote) = tokio::select! {
            () = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        let server = server.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<Incoming>| {
                let server = server.clone();
                async move { Ok::<_, Infallible>(handle(&server, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                if !err.is_incomplete_message() {
                    error!(%remote, "Connection error: {:?}", err);
                }
            }
        });
    }
}

//! Per-request response dispatch.
//!
//! The [`Dispatcher`] classifies an execution outcome and either answers with
//! a single JSON body or opens a streaming body and drains the producer into
//! it on a dedicated task. Each request moves through
//! `Idle -> Classifying -> Delivering -> Closed`, and its transport is ended
//! exactly once, when the delivery task drops the body sender.

use crate::streaming::{EventStreamFramer, Framer, MultipartFramer};
use crate::transport::{body_channel, full, BodySender, BoxBody, CloseSignal};
use crate::watcher::ConnectionWatcher;
use gqlwire_runtime::{
    classify, DeliveryKind, DeliveryMode, ExecutionOutcome, ExecutionResult, ResultProducer,
    Termination,
};
use hyper::{Response, StatusCode};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Classifying,
    Delivering,
    Closed,
}

#[derive(Debug)]
struct Lifecycle {
    state: DispatchState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: DispatchState::Idle,
        }
    }

    fn advance(&mut self, next: DispatchState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (DispatchState::Idle, DispatchState::Classifying)
                    | (DispatchState::Classifying, DispatchState::Delivering)
                    | (DispatchState::Delivering, DispatchState::Closed)
            ),
            "invalid dispatch transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "dispatch state");
        self.state = next;
    }
}

/// How a streamed delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEnd {
    /// The producer ran out.
    Exhausted,
    /// The producer failed fatally after delivering its error.
    Failed,
    /// The stream was cancelled while the transport was still open.
    Cancelled,
    /// The client went away.
    TransportClosed,
}

/// Summary of one streamed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub kind: DeliveryKind,
    /// Parts fully handed to the transport, excluding preamble and epilogue.
    pub parts_written: usize,
    /// Items pulled from the producer.
    pub pulled: usize,
    pub end: DeliveryEnd,
    /// Time from opening the stream to ending its transport.
    pub elapsed: Duration,
}

/// A response plus, for streamed modes, the task delivering its body.
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response<BoxBody>,
    pub delivery: Option<JoinHandle<DeliveryReport>>,
}

/// Turns execution outcomes into HTTP responses.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    body_capacity: usize,
}

impl Dispatcher {
    /// Creates a dispatcher whose streaming bodies buffer `body_capacity` frames.
    pub fn new(body_capacity: usize) -> Self {
        Self { body_capacity }
    }

    /// Classifies `outcome` and starts delivering it.
    ///
    /// Streamed modes spawn their delivery task onto the current runtime.
    pub fn dispatch(&self, outcome: ExecutionOutcome) -> Dispatched {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(DispatchState::Classifying);

        let mode = classify(outcome);
        lifecycle.advance(DispatchState::Delivering);
        debug!(mode = %mode.kind(), "delivering response");

        match mode {
            DeliveryMode::Single { status, result } => {
                let response = single_response(status, &result);
                lifecycle.advance(DispatchState::Closed);
                Dispatched {
                    response,
                    delivery: None,
                }
            }
            DeliveryMode::Multipart(producer) => self.open(MultipartFramer, producer, lifecycle),
            DeliveryMode::EventStream(producer) => {
                self.open(EventStreamFramer, producer, lifecycle)
            }
        }
    }

    fn open<F: Framer>(
        &self,
        framer: F,
        producer: ResultProducer<F::Item>,
        lifecycle: Lifecycle,
    ) -> Dispatched {
        let (sender, body, closed) = body_channel(self.body_capacity);
        let delivery = tokio::spawn(deliver(framer, producer, sender, closed, lifecycle));

        let mut builder = Response::builder().status(StatusCode::OK);
        for (name, value) in F::HEADERS {
            builder = builder.header(*name, *value);
        }

        Dispatched {
            response: build_response(builder, body.into_box_body()),
            delivery: Some(delivery),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(crate::transport::DEFAULT_BODY_CAPACITY)
    }
}

/// Drains `producer` through `framer` into `sink`.
///
/// Each part is fully handed to the transport before the next item is
/// pulled. A payload the framer marks as final ends the stream even if the
/// upstream source stays open. A failed write counts as a disconnect: the producer is cancelled
/// and nothing else is written.
async fn deliver<F: Framer>(
    framer: F,
    mut producer: ResultProducer<F::Item>,
    mut sink: BodySender,
    closed: CloseSignal,
    mut lifecycle: Lifecycle,
) -> DeliveryReport {
    let started = Instant::now();
    let watcher = ConnectionWatcher::attach(closed, producer.cancel_handle());
    let mut parts_written = 0;
    let mut transport_lost = false;

    if let Some(preamble) = framer.preamble() {
        if sink.write(preamble).await.is_err() {
            transport_lost = true;
            producer.cancel();
        }
    }

    while !transport_lost {
        let Some(item) = producer.next().await else {
            break;
        };

        let part = match framer.encode(&item) {
            Ok(part) => part,
            Err(e) => {
                error!(error = %e, "failed to encode part, ending stream");
                producer.cancel();
                break;
            }
        };

        if sink.write(part).await.is_err() {
            transport_lost = true;
            producer.cancel();
            break;
        }
        parts_written += 1;

        if framer.is_final(&item) {
            producer.finish();
            break;
        }
    }

    let watcher_fired = watcher.detach().await;
    transport_lost |= watcher_fired || sink.is_closed();

    if !transport_lost {
        if let Some(epilogue) = framer.epilogue() {
            if sink.write(epilogue).await.is_err() {
                transport_lost = true;
            }
        }
    }
    drop(sink);
    lifecycle.advance(DispatchState::Closed);

    let end = if transport_lost {
        DeliveryEnd::TransportClosed
    } else {
        match producer.termination() {
            Some(Termination::Exhausted) => DeliveryEnd::Exhausted,
            Some(Termination::Failed) => DeliveryEnd::Failed,
            Some(Termination::Cancelled) | None => DeliveryEnd::Cancelled,
        }
    };

    let report = DeliveryReport {
        kind: F::KIND,
        parts_written,
        pulled: producer.pulled(),
        end,
        elapsed: started.elapsed(),
    };
    match end {
        DeliveryEnd::Exhausted => debug!(?report, "stream delivered"),
        DeliveryEnd::TransportClosed => info!(?report, "client disconnected"),
        DeliveryEnd::Failed | DeliveryEnd::Cancelled => warn!(?report, "stream ended early"),
    }
    report
}

/// A complete JSON response for a single result.
pub fn single_response(status: u16, result: &ExecutionResult) -> Response<BoxBody> {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(result) {
        Ok(body) => build_response(
            Response::builder()
                .status(status)
                .header("Content-Type", "application/json"),
            full(body),
        ),
        Err(e) => {
            error!(error = %e, "failed to serialize execution result");
            json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// A JSON error body in GraphQL response shape.
pub fn json_error_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    let body = serde_json::json!({
        "data": null,
        "errors": [{ "message": message }],
    });
    build_response(
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json"),
        full(body.to_string()),
    )
}

pub(crate) fn build_response(
    builder: hyper::http::response::Builder,
    body: BoxBody,
) -> Response<BoxBody> {
    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build response");
            let mut response = Response::new(full("Internal server error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use gqlwire_runtime::{GraphQLError, IncrementalChunk, ProducerError};
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn body_string(response: Response<BoxBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header<'a>(response: &'a Response<BoxBody>, name: &str) -> &'a str {
        response.headers()[name].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_single_failure() {
        let dispatched = Dispatcher::default().dispatch(ExecutionOutcome::Response(
            ExecutionResult::error(GraphQLError::new("boom")),
        ));
        assert!(dispatched.delivery.is_none());

        let response = dispatched.response;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(header(&response, "content-type"), "application/json");
        assert_eq!(
            body_string(response).await,
            r#"{"data":null,"errors":[{"message":"boom"}]}"#
        );
    }

    #[tokio::test]
    async fn test_single_success() {
        let dispatched = Dispatcher::default().dispatch(ExecutionOutcome::Response(
            ExecutionResult::data(serde_json::json!({"hello": "world"})),
        ));
        assert_eq!(dispatched.response.status(), StatusCode::OK);
        assert_eq!(
            body_string(dispatched.response).await,
            r#"{"data":{"hello":"world"}}"#
        );
    }

    #[tokio::test]
    async fn test_multipart_delivery() {
        let chunks = vec![
            Ok(IncrementalChunk::initial(serde_json::json!({"a": 1}))),
            Ok(IncrementalChunk::builder(serde_json::json!({"a": 2})).last().build()),
        ];
        let dispatched =
            Dispatcher::default().dispatch(ExecutionOutcome::Incremental(stream::iter(chunks).boxed()));

        let response = dispatched.response;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), "multipart/mixed; boundary=\"-\"");
        assert_eq!(header(&response, "connection"), "keep-alive");
        assert_eq!(header(&response, "transfer-encoding"), "chunked");

        let body = body_string(response).await;
        assert!(body.starts_with("---\r\nContent-Type: application/json; charset=utf-8\r\n"));
        assert!(body.contains("{\"data\":{\"a\":1},\"hasNext\":true}\r\n---\r\n"));
        assert!(body.ends_with("{\"data\":{\"a\":2},\"hasNext\":false}\r\n-----\r\n"));

        let report = dispatched.delivery.unwrap().await.unwrap();
        assert_eq!(report.kind, DeliveryKind::Multipart);
        assert_eq!(report.parts_written, 2);
        assert_eq!(report.end, DeliveryEnd::Exhausted);
    }

    #[tokio::test]
    async fn test_cancel_after_k_parts() {
        for k in 0..3usize {
            let chunks: Vec<_> = (0..k)
                .map(|i| {
                    Ok::<_, ProducerError>(IncrementalChunk::builder(serde_json::json!({ "i": i }))
                        .has_next()
                        .build())
                })
                .collect();
            let source = stream::iter(chunks).chain(stream::pending());
            let mut producer = ResultProducer::from_stream(source);
            let cancel = producer.cancel_handle();

            let (sender, mut body, closed) = body_channel(1);
            let task = tokio::spawn(async move {
                deliver(MultipartFramer, producer, sender, closed, {
                    let mut lifecycle = Lifecycle::new();
                    lifecycle.advance(DispatchState::Classifying);
                    lifecycle.advance(DispatchState::Delivering);
                    lifecycle
                })
                .await
            });

            // Preamble plus k parts.
            let mut frames = Vec::new();
            for _ in 0..=k {
                let frame = body.frame().await.unwrap().unwrap();
                frames.push(frame.into_data().unwrap());
            }
            tokio::task::yield_now().await;
            assert!(cancel.cancel());

            assert_eq!(&frames[0][..], b"---");
            let rest = body.collect().await.unwrap().to_bytes();
            assert_eq!(&rest[..], crate::streaming::MULTIPART_CLOSE);

            let report = task.await.unwrap();
            assert_eq!(report.parts_written, k);
            assert_eq!(report.pulled, k);
            assert_eq!(report.end, DeliveryEnd::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_subscription_disconnect() {
        let drops = Arc::new(AtomicUsize::new(0));
        struct Release(Arc<AtomicUsize>);
        impl Drop for Release {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let release = Release(drops.clone());
        let source = stream::iter(vec![Ok::<_, ProducerError>(ExecutionResult::data(
            serde_json::json!({"clock": "T1"}),
        ))])
        .chain(stream::pending())
        .map(move |item| {
            let _ = &release;
            item
        });

        let dispatched =
            Dispatcher::default().dispatch(ExecutionOutcome::Subscription(source.boxed()));
        let response = dispatched.response;
        assert_eq!(header(&response, "content-type"), "text/event-stream");
        assert_eq!(header(&response, "cache-control"), "no-cache");

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(&first[..], b"data: {\"data\":{\"clock\":\"T1\"}}\n\n");

        drop(body);

        let report = tokio::time::timeout(Duration::from_millis(500), dispatched.delivery.unwrap())
            .await
            .expect("delivery should stop after disconnect")
            .unwrap();
        assert_eq!(report.kind, DeliveryKind::EventStream);
        assert_eq!(report.parts_written, 1);
        assert_eq!(report.pulled, 1);
        assert_eq!(report.end, DeliveryEnd::TransportClosed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_chunk_ends_open_source() {
        let drops = Arc::new(AtomicUsize::new(0));
        struct Release(Arc<AtomicUsize>);
        impl Drop for Release {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let release = Release(drops.clone());
        let source = stream::iter(vec![
            Ok::<_, ProducerError>(IncrementalChunk::initial(serde_json::json!({"a": 1}))),
            Ok(IncrementalChunk::builder(serde_json::json!({"a": 2})).last().build()),
        ])
        .chain(stream::pending())
        .map(move |item| {
            let _ = &release;
            item
        });

        let dispatched = Dispatcher::default().dispatch(ExecutionOutcome::Incremental(source.boxed()));
        let body = tokio::time::timeout(Duration::from_millis(500), body_string(dispatched.response))
            .await
            .expect("body should end after the hasNext=false chunk");
        assert!(body.ends_with("{\"data\":{\"a\":2},\"hasNext\":false}\r\n-----\r\n"));

        let report = dispatched.delivery.unwrap().await.unwrap();
        assert_eq!(report.parts_written, 2);
        assert_eq!(report.pulled, 2);
        assert_eq!(report.end, DeliveryEnd::Exhausted);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_report_measures_delivery_time() {
        let source = stream::once(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ProducerError>(IncrementalChunk::builder(serde_json::json!({"a": 1})).build())
        });
        let dispatched = Dispatcher::default().dispatch(ExecutionOutcome::Incremental(source.boxed()));
        body_string(dispatched.response).await;

        let report = dispatched.delivery.unwrap().await.unwrap();
        assert_eq!(report.end, DeliveryEnd::Exhausted);
        assert!(report.elapsed >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_fatal_error_ends_multipart() {
        let chunks = vec![
            Ok(IncrementalChunk::initial(serde_json::json!({"books": []}))),
            Err(ProducerError::fatal("database unavailable")),
        ];
        let dispatched =
            Dispatcher::default().dispatch(ExecutionOutcome::Incremental(stream::iter(chunks).boxed()));

        let body = body_string(dispatched.response).await;
        assert!(body.ends_with(
            "{\"data\":null,\"errors\":[{\"message\":\"database unavailable\"}],\"hasNext\":false}\r\n-----\r\n"
        ));

        let report = dispatched.delivery.unwrap().await.unwrap();
        assert_eq!(report.parts_written, 2);
        assert_eq!(report.end, DeliveryEnd::Failed);
    }

    #[tokio::test]
    async fn test_concurrent_streams_do_not_interleave() {
        let dispatcher = Dispatcher::default();
        let streams: Vec<_> = (0..4)
            .map(|s| {
                let events = (0..5).map(move |n| {
                    Ok::<_, ProducerError>(ExecutionResult::data(
                        serde_json::json!({ "stream": s, "n": n }),
                    ))
                });
                dispatcher.dispatch(ExecutionOutcome::Subscription(stream::iter(events).boxed()))
            })
            .collect();

        let bodies = futures::future::join_all(
            streams
                .into_iter()
                .map(|dispatched| body_string(dispatched.response)),
        )
        .await;

        for (s, body) in bodies.iter().enumerate() {
            let expected: String = (0..5)
                .map(|n| format!("data: {{\"data\":{{\"n\":{},\"stream\":{}}}}}\n\n", n, s))
                .collect();
            assert_eq!(body, &expected);
        }
    }
}

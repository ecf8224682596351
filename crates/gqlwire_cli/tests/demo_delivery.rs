//! The demo executor delivered through the dispatcher.

use futures::StreamExt;
use gqlwire_cli::DemoExecutor;
use gqlwire_sdk::{DeliveryEnd, DeliveryKind, Dispatcher, Executor, GraphQLRequest};
use http_body_util::BodyExt;
use std::time::Duration;

fn executor() -> DemoExecutor {
    DemoExecutor::new(Duration::from_millis(5))
}

async fn collect(response: gqlwire_sdk::dispatch::Dispatched) -> (u16, String, String) {
    let status = response.response.status().as_u16();
    let content_type = response.response.headers()["content-type"]
        .to_str()
        .unwrap()
        .to_string();
    let bytes = response
        .response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_syntax_error_is_400() {
    let outcome = executor().execute(GraphQLRequest::new("{ getBooks")).await;
    let (status, content_type, body) = collect(Dispatcher::default().dispatch(outcome)).await;

    assert_eq!(status, 400);
    assert_eq!(content_type, "application/json");
    assert!(body.starts_with(r#"{"data":null,"errors":[{"message":"Syntax Error"#));
}

#[tokio::test]
async fn test_stream_is_multipart() {
    let outcome = executor()
        .execute(GraphQLRequest::new("{ getBooks @stream { title } }"))
        .await;
    let mut dispatched = Dispatcher::default().dispatch(outcome);
    let delivery = dispatched.delivery.take().unwrap();
    let (status, content_type, body) = collect(dispatched).await;

    assert_eq!(status, 200);
    assert_eq!(content_type, "multipart/mixed; boundary=\"-\"");
    assert!(body.starts_with("---\r\nContent-Type: application/json; charset=utf-8\r\n"));
    assert!(body.ends_with("\"hasNext\":false}\r\n-----\r\n"));
    assert_eq!(body.matches("Content-Length: ").count(), 4);
    assert!(body.find("The Dispossessed").unwrap() < body.find("Kindred").unwrap());

    let report = delivery.await.unwrap();
    assert_eq!(report.kind, DeliveryKind::Multipart);
    assert_eq!(report.parts_written, 4);
    assert!(matches!(report.end, DeliveryEnd::Exhausted));
}

#[tokio::test]
async fn test_clock_is_event_stream_until_disconnect() {
    let outcome = executor()
        .execute(GraphQLRequest::new("subscription { clock }"))
        .await;
    let mut dispatched = Dispatcher::default().dispatch(outcome);
    let delivery = dispatched.delivery.take().unwrap();
    assert_eq!(
        dispatched.response.headers()["content-type"],
        "text/event-stream"
    );

    let mut frames = dispatched.response.into_body().into_data_stream();
    let mut events = Vec::new();
    while events.len() < 2 {
        let frame = frames.next().await.unwrap().unwrap();
        events.push(String::from_utf8(frame.to_vec()).unwrap());
    }
    assert_eq!(events[0], "data: {\"data\":{\"clock\":\"T1\"}}\n\n");
    assert_eq!(events[1], "data: {\"data\":{\"clock\":\"T2\"}}\n\n");

    drop(frames);
    let report = tokio::time::timeout(Duration::from_secs(2), delivery)
        .await
        .expect("delivery should stop after disconnect")
        .unwrap();
    assert_eq!(report.kind, DeliveryKind::EventStream);
    assert!(matches!(report.end, DeliveryEnd::TransportClosed));
}

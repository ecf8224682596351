//! Wire framings for streamed GraphQL responses.
//!
//! - [`MultipartFramer`]: `multipart/mixed` incremental delivery for
//!   `@defer`/`@stream` queries.
//! - [`EventStreamFramer`]: Server-Sent Events for subscriptions.
//!
//! Both framings are byte-exact; clients split parts on these markers.
//!
//! # Example
//!
//! ```ignore
//! use gqlwire_sdk::streaming::{Framer, MultipartFramer};
//! use gqlwire_runtime::IncrementalChunk;
//!
//! let framer = MultipartFramer;
//! let part = framer.encode(&IncrementalChunk::initial(serde_json::json!({"a": 1})))?;
//! // "\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: 31\r\n\r\n{...}\r\n---"
//! ```

use crate::error::{SdkError, SdkResult};
use bytes::{BufMut, Bytes, BytesMut};
use gqlwire_runtime::{DeliveryKind, ExecutionResult, IncrementalChunk, Payload};

macro_rules! boundary {
    () => {
        "-"
    };
}

/// Multipart boundary token.
///
/// Fixed rather than random for compatibility with existing clients. Payload
/// content is not checked for collisions with it.
pub const MULTIPART_BOUNDARY: &str = boundary!();

/// `Content-Type` of a multipart response.
pub const MULTIPART_CONTENT_TYPE: &str =
    concat!("multipart/mixed; boundary=\"", boundary!(), "\"");

/// Delimiter written after the preamble and after every part but the last.
pub const MULTIPART_DELIMITER: &[u8] = concat!("--", boundary!()).as_bytes();

/// Written once when a multipart stream ends.
pub const MULTIPART_CLOSE: &[u8] = concat!("\r\n--", boundary!(), "--\r\n").as_bytes();

/// `Content-Type` of every multipart part.
pub const PART_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// `Content-Type` of an SSE response.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Encodes one kind of payload onto a streaming body.
pub trait Framer: Send + Sync + 'static {
    /// The payload type this framing carries.
    type Item: Payload + serde::Serialize;

    /// The delivery mode this framing implements.
    const KIND: DeliveryKind;

    /// Response headers written when the stream opens.
    const HEADERS: &'static [(&'static str, &'static str)];

    /// Bytes written once when the stream opens.
    fn preamble(&self) -> Option<Bytes>;

    /// Encodes one payload.
    fn encode(&self, item: &Self::Item) -> SdkResult<Bytes>;

    /// Returns true if `item` is the last payload of its sequence, even when
    /// the upstream source has not ended.
    fn is_final(&self, item: &Self::Item) -> bool;

    /// Bytes written once when the stream ends.
    fn epilogue(&self) -> Option<Bytes>;
}

fn to_json<T: serde::Serialize>(payload: &T) -> SdkResult<Vec<u8>> {
    serde_json::to_vec(payload)
        .map_err(|e| SdkError::serialize(format!("Failed to encode payload: {}", e)))
}

/// `multipart/mixed` framing for incremental chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartFramer;

impl Framer for MultipartFramer {
    type Item = IncrementalChunk;

    const KIND: DeliveryKind = DeliveryKind::Multipart;

    const HEADERS: &'static [(&'static str, &'static str)] = &[
        ("Connection", "keep-alive"),
        ("Content-Type", MULTIPART_CONTENT_TYPE),
        ("Transfer-Encoding", "chunked"),
    ];

    fn preamble(&self) -> Option<Bytes> {
        Some(Bytes::from_static(MULTIPART_DELIMITER))
    }

    fn encode(&self, chunk: &IncrementalChunk) -> SdkResult<Bytes> {
        let json = to_json(chunk)?;
        let length = json.len().to_string();

        let mut part = BytesMut::with_capacity(json.len() + 96);
        part.put_slice(b"\r\nContent-Type: ");
        part.put_slice(PART_CONTENT_TYPE.as_bytes());
        part.put_slice(b"\r\nContent-Length: ");
        part.put_slice(length.as_bytes());
        part.put_slice(b"\r\n\r\n");
        part.put_slice(&json);
        if chunk.has_next {
            part.put_slice(b"\r\n");
            part.put_slice(MULTIPART_DELIMITER);
        }
        Ok(part.freeze())
    }

    fn is_final(&self, chunk: &IncrementalChunk) -> bool {
        !chunk.has_next
    }

    fn epilogue(&self) -> Option<Bytes> {
        Some(Bytes::from_static(MULTIPART_CLOSE))
    }
}

/// Server-Sent Events framing for subscription results.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventStreamFramer;

impl Framer for EventStreamFramer {
    type Item = ExecutionResult;

    const KIND: DeliveryKind = DeliveryKind::EventStream;

    const HEADERS: &'static [(&'static str, &'static str)] = &[
        ("Content-Type", EVENT_STREAM_CONTENT_TYPE),
        ("Connection", "keep-alive"),
        ("Cache-Control", "no-cache"),
    ];

    fn preamble(&self) -> Option<Bytes> {
        None
    }

    fn encode(&self, result: &ExecutionResult) -> SdkResult<Bytes> {
        // Compact JSON escapes control characters, so the payload never
        // contains a raw newline that would end the event early.
        let json = to_json(result)?;

        let mut event = BytesMut::with_capacity(json.len() + 8);
        event.put_slice(b"data: ");
        event.put_slice(&json);
        event.put_slice(b"\n\n");
        Ok(event.freeze())
    }

    fn is_final(&self, _result: &ExecutionResult) -> bool {
        false
    }

    fn epilogue(&self) -> Option<Bytes> {
        None
    }
}

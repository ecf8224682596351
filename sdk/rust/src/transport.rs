//! Streaming response bodies.
//!
//! [`body_channel`] splits one HTTP response body into three parts:
//! - [`BodySender`], owned by the delivery task, writes framed bytes.
//! - [`ResponseBody`], handed to hyper, yields those bytes as data frames.
//! - [`CloseSignal`], resolved once hyper drops the body, which happens when
//!   the client goes away or the response has been fully written.
//!
//! The channel is bounded, so a write waits until hyper has taken the
//! previous frame. Dropping the sender ends the body.

use crate::error::{SdkError, SdkResult};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Default number of frames buffered between the delivery task and hyper.
pub const DEFAULT_BODY_CAPACITY: usize = 1;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// A complete, non-streaming body.
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Creates a streaming body with the given frame capacity.
pub fn body_channel(capacity: usize) -> (BodySender, ResponseBody, CloseSignal) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (close_tx, close_rx) = oneshot::channel();
    (
        BodySender { tx },
        ResponseBody {
            rx,
            _on_close: close_tx,
        },
        CloseSignal { rx: close_rx },
    )
}

/// Write half of a streaming body.
#[derive(Debug)]
pub struct BodySender {
    tx: mpsc::Sender<Bytes>,
}

impl BodySender {
    /// Writes one frame, waiting for the reader to make room.
    ///
    /// Fails once the body has been dropped.
    pub async fn write(&mut self, bytes: Bytes) -> SdkResult<()> {
        self.tx
            .send(bytes)
            .await
            .map_err(|_| SdkError::transport_closed())
    }

    /// Returns true if the body has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half of a streaming body.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::Receiver<Bytes>,
    // Dropped together with the body, which resolves the CloseSignal.
    _on_close: oneshot::Sender<()>,
}

impl ResponseBody {
    /// Boxes the body for use in a response.
    pub fn into_box_body(self) -> BoxBody {
        self.map_err(|never| match never {}).boxed()
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}

/// Resolves once the response body has been dropped.
#[derive(Debug)]
pub struct CloseSignal {
    rx: oneshot::Receiver<()>,
}

impl CloseSignal {
    /// Waits for the body to be dropped.
    pub async fn closed(self) {
        // The sender is never used, only dropped.
        let _ = self.rx.await;
    }
}

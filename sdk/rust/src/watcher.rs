//! Transport close detection.

use crate::transport::CloseSignal;
use gqlwire_runtime::CancelHandle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cancels a stream when its transport closes.
///
/// The watcher runs on its own task, separate from the task draining the
/// stream, and fires the [`CancelHandle`] at most once. It must be detached
/// before the stream's transport is ended, so that a normal end of response
/// is never mistaken for a disconnect.
#[derive(Debug)]
pub struct ConnectionWatcher {
    detach: oneshot::Sender<()>,
    task: JoinHandle<bool>,
}

impl ConnectionWatcher {
    /// Starts watching `signal` on behalf of `cancel`.
    pub fn attach(signal: CloseSignal, cancel: CancelHandle) -> Self {
        let (detach, detached) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = detached => false,
                () = signal.closed() => {
                    let fired = cancel.cancel();
                    if fired {
                        debug!("transport closed, stream cancelled");
                    }
                    fired
                }
            }
        });
        Self { detach, task }
    }

    /// Stops watching. Returns true if the watcher cancelled the stream.
    pub async fn detach(self) -> bool {
        let _ = self.detach.send(());
        self.task.await.unwrap_or(false)
    }
}

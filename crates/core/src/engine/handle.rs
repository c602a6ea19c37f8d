//! Cancellable handle onto a running transcode.

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use super::types::EngineEvent;

/// Event buffer per running transcode.
const EVENT_BUFFER: usize = 64;

/// Receiving side of a running transcode.
///
/// Dropping the handle cancels the engine: the producing task observes the
/// cancellation through its [`EventSink`] and kills the external process.
#[derive(Debug)]
pub struct TranscodeHandle {
    events: mpsc::Receiver<EngineEvent>,
    _cancel_on_drop: DropGuard,
}

impl TranscodeHandle {
    /// Creates a connected sink/handle pair.
    pub fn channel() -> (EventSink, TranscodeHandle) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let sink = EventSink {
            tx,
            cancel: cancel.clone(),
        };
        let handle = TranscodeHandle {
            events: rx,
            _cancel_on_drop: cancel.drop_guard(),
        };
        (sink, handle)
    }

    /// Waits for the next event. `None` means the engine went away without
    /// reporting a terminal event.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Stops the engine.
    pub fn cancel(self) {
        drop(self);
    }
}

/// Producing side of a running transcode, owned by the engine task.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Delivers an event. Returns `false` once the handle is gone.
    pub async fn emit(&self, event: EngineEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }

    /// Resolves when the handle has been dropped or cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

use dstore_directory::CallbackSink;
use dstore_types::CallbackRequest;
use tokio::sync::mpsc;

/// Producer side of the callback queue, handed to the directories.
#[derive(Clone, Debug)]
pub struct CallbackQueue {
    tx: mpsc::UnboundedSender<CallbackRequest>,
}

/// Consumer side of the callback queue, drained by the coordinator.
#[derive(Debug)]
pub struct CallbackReceiver {
    rx: mpsc::UnboundedReceiver<CallbackRequest>,
}

impl CallbackQueue {
    pub fn channel() -> (CallbackQueue, CallbackReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CallbackQueue { tx }, CallbackReceiver { rx })
    }
}

impl CallbackReceiver {
    pub async fn recv(&mut self) -> Option<CallbackRequest> {
        self.rx.recv().await
    }

    /// Take a request if one is already queued.
    pub fn try_recv(&mut self) -> Option<CallbackRequest> {
        self.rx.try_recv().ok()
    }
}

impl CallbackSink for CallbackQueue {
    fn submit(&self, request: CallbackRequest) {
        if let Err(e) = self.tx.send(request) {
            tracing::warn!(request = %e.0, "callback coordinator stopped, dropping request");
        }
    }
}

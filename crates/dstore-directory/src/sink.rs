//! The seam between the directory and callback delivery.

use std::sync::Mutex;

use dstore_types::CallbackRequest;

/// Accepts callback requests produced by access grants.
///
/// `submit` is called after the per-key lock has been released and must not
/// block on delivery: the directory's response latency is bounded by local
/// work only.
pub trait CallbackSink: Send + Sync {
    fn submit(&self, request: CallbackRequest);
}

/// A sink that records requests instead of delivering them.
///
/// Useful for embedding the directory without a callback transport, and for
/// asserting which callbacks a grant produced.
#[derive(Debug, Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<CallbackRequest>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every request recorded so far.
    pub fn drain(&self) -> Vec<CallbackRequest> {
        self.requests
            .lock()
            .map(|mut requests| std::mem::take(&mut *requests))
            .unwrap_or_default()
    }
}

impl CallbackSink for RecordingSink {
    fn submit(&self, request: CallbackRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }
}

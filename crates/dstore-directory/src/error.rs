//! Error types for directory operations.

use dstore_store::StoreError;
use dstore_types::{CallbackKey, NodeId};
use thiserror::Error;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The requesting node was never registered or has been marked dead.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A malformed request: negative count or object ID, non-positive class ID.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's request is inconsistent with the access it holds.
    #[error("cache consistency violation by {node} on {key}: {reason}")]
    CacheConsistency {
        node: NodeId,
        key: CallbackKey,
        reason: String,
    },

    /// A live node with the same identity is already registered.
    #[error("node {identity} already registered as {existing}")]
    DuplicateRegistration { identity: String, existing: NodeId },

    /// Every update-queue port is assigned to a live node.
    #[error("no free update queue port in {first}..={last}")]
    PortsExhausted { first: u16, last: u16 },

    /// A thread panicked while holding a directory lock.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The backing store failed while resolving a request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DirectoryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Convenience type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

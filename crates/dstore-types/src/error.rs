use thiserror::Error;

/// Errors reported by a node's callback endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("callback refused by node: {0}")]
    Refused(String),

    #[error("malformed callback exchange: {0}")]
    Protocol(String),
}

use dstore_directory::DirectoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic failure categories that survive the trip over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownNode,
    InvalidArgument,
    CacheConsistency,
    DuplicateRegistration,
    /// The server cannot take the request right now (e.g. no free ports).
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UnknownNode => "unknown node",
            Self::InvalidArgument => "invalid argument",
            Self::CacheConsistency => "cache consistency",
            Self::DuplicateRegistration => "duplicate registration",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The server processed the request and rejected it.
    #[error("{kind}: {message}")]
    Remote { kind: ErrorKind, message: String },

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// The semantic failure, if the error came from the server's decision
    /// rather than from moving bytes.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the whole operation may be retried against a fresh connection.
    pub fn is_transport(&self) -> bool {
        self.kind().is_none()
    }
}

impl From<DirectoryError> for ProtocolError {
    fn from(error: DirectoryError) -> Self {
        let kind = match &error {
            DirectoryError::UnknownNode(_) => ErrorKind::UnknownNode,
            DirectoryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DirectoryError::CacheConsistency { .. } => ErrorKind::CacheConsistency,
            DirectoryError::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
            DirectoryError::PortsExhausted { .. } => ErrorKind::Unavailable,
            DirectoryError::LockPoisoned(_) => ErrorKind::Internal,
            DirectoryError::Store(_) => ErrorKind::Internal,
        };
        Self::Remote {
            kind,
            message: error.to_string(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] dstore_protocol::ProtocolError),

    #[error("directory error: {0}")]
    Directory(#[from] dstore_directory::DirectoryError),

    #[error("store error: {0}")]
    Store(#[from] dstore_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

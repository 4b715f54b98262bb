//! Wire protocol for the caching data store.
//!
//! [`CachingDataStoreServer`] is the contract between application nodes and
//! the directory server. It is transport-agnostic: the server's facade
//! implements it in-process, and [`DstoreClient`] implements it over TCP.
//! Requests and responses travel as length-prefixed bincode frames
//! ([`DstoreCodec`]); release callbacks use the same framing in the other
//! direction ([`RemoteCallbackServer`], [`serve_callbacks`]).

pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod service;
pub mod transport;

pub use client::DstoreClient;
pub use codec::DstoreCodec;
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ErrorKind, ProtocolError, ProtocolResult};
pub use message::{CallbackMessage, Message, Request, Response, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use service::{dispatch, CachingDataStoreServer};
pub use transport::{serve_callbacks, RemoteCallbackServer};

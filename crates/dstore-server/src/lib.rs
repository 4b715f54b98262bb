//! Directory server for the caching data store.
//!
//! Serves the [`CachingDataStoreServer`](dstore_protocol::CachingDataStoreServer)
//! contract to application nodes over TCP, delivers release callbacks back to
//! them, and exposes an admin HTTP API for health and node inspection.

pub mod config;
pub mod data_store;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{PortRange, ServerConfig};
pub use data_store::{CachingDataStore, DirectoryStats};
pub use error::{ServerError, ServerResult};
pub use server::{serve_requests, DstoreServer};

//! Foundation types for the caching data store.
//!
//! Every other dstore crate depends on `dstore-types`. The types here are the
//! vocabulary of the coherence protocol spoken between application nodes and
//! the data store server.
//!
//! # Key Types
//!
//! - [`NodeId`] — Identity assigned to a cache node at registration
//! - [`AccessMode`] — Read or write access held by a node for a key
//! - [`ReleaseKind`] — What a callback asks a holder to give up
//! - [`BindingKey`] — Ordered name key, with an end-of-namespace sentinel
//! - [`CallbackKey`] / [`CallbackRequest`] — Unit of callback work
//! - [`CallbackServer`] — The endpoint a node registers to receive callbacks
//! - Result records returned by each directory operation (see [`results`])

pub mod access;
pub mod callback;
pub mod error;
pub mod key;
pub mod node;
pub mod results;

pub use access::{AccessMode, ReleaseKind};
pub use callback::{CallbackRequest, CallbackServer};
pub use error::CallbackError;
pub use key::{BindingKey, CallbackKey};
pub use node::NodeId;
pub use results::{
    GetBindingForRemoveResults, GetBindingForUpdateResults, GetBindingResults,
    GetObjectForUpdateResults, GetObjectResults, NextBoundNameResults, NextObjectResults,
    RegisterNodeResult,
};

/// Object ID sentinel meaning "no object" or "start of iteration".
pub const NO_OBJECT: i64 = -1;

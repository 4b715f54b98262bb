//! Coherence directory for the caching data store.
//!
//! Application nodes cache objects and name bindings locally. This crate
//! tracks, per object ID and per binding name, which node currently holds
//! read or write access, and decides what must be reclaimed from whom when
//! another node asks for conflicting access.
//!
//! # Architecture
//!
//! - **Grants are optimistic.** A conflicting request is granted at once; the
//!   displaced holder is recorded as releasing and a callback is submitted to
//!   a [`CallbackSink`]. The requester learns about the outstanding conflict
//!   through the `callback_*` flags in its result.
//! - **Keys are independent.** Each object ID and binding key is locked on
//!   its own; there is no directory-wide lock on the request path.
//! - **Dead nodes hold nothing.** Marking a node dead in the
//!   [`NodeRegistry`] rejects its further requests, and the caller strips its
//!   access with `force_release_node`.
//!
//! # Modules
//!
//! - [`node`] — [`NodeRegistry`]: node IDs, update-queue ports, liveness
//! - [`ids`] — [`ObjectIdAllocator`]: contiguous object ID blocks
//! - [`class_info`] — [`ClassInfoRegistry`]: class descriptor interning
//! - [`access`] — [`AccessEntry`]: per-key holder sets and grant rules
//! - [`objects`] — [`LockDirectory`]: access to objects
//! - [`bindings`] — [`BindingIndex`]: access to the ordered name namespace
//! - [`sink`] — [`CallbackSink`]: where grants send their callbacks

pub mod access;
pub mod bindings;
pub mod class_info;
pub mod error;
pub mod ids;
pub mod node;
pub mod objects;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::{AccessEntry, Conflicts, Grant};
pub use bindings::BindingIndex;
pub use class_info::ClassInfoRegistry;
pub use error::{DirectoryError, Result};
pub use ids::ObjectIdAllocator;
pub use node::{NodeInfo, NodeRegistry, Registration};
pub use objects::LockDirectory;
pub use sink::{CallbackSink, RecordingSink};

//! Backing store interface for the caching data store.
//!
//! The directory layer never owns durable data. It consults a
//! [`BackingStore`] on a cache miss to learn an object's bytes, what a name
//! is bound to, and which object or name comes next in iteration order. The
//! on-disk engine behind the trait lives outside this workspace.
//!
//! # Storage Backends
//!
//! - [`InMemoryBackingStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Object IDs are non-negative; `-1` is only ever a query sentinel.
//! 2. Name order is byte order, with no wraparound.
//! 3. "Next" queries are strictly greater than their argument and never
//!    return removed entries.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackingStore;
pub use traits::BackingStore;

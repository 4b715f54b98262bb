//! Callback coordination for the caching data store.
//!
//! Grants in the directory never wait for the node being displaced. They
//! push a [`CallbackRequest`](dstore_types::CallbackRequest) onto a
//! [`CallbackQueue`] and return. A [`CallbackCoordinator`] running as its own
//! tokio task drains the queue and delivers each request to the target
//! node's registered endpoint:
//!
//! ```text
//! LockDirectory / BindingIndex
//!         │ submit (non-blocking)
//!         ▼
//!   CallbackQueue ──mpsc──▶ CallbackCoordinator ──▶ CallbackServer (node)
//!                                  │
//!                ack ──────────────┼──▶ complete_release(node, key)
//!                retries exhausted ┴──▶ mark_dead + force_release_node
//! ```
//!
//! A slow or unreachable node therefore delays nobody but itself, and a node
//! that never answers is eventually declared dead so its access stops
//! shadowing other nodes' grants.

pub mod config;
pub mod coordinator;
pub mod queue;

pub use config::CallbackConfig;
pub use coordinator::{CallbackCoordinator, DeliveryOutcome};
pub use queue::{CallbackQueue, CallbackReceiver};

//! Result records returned by the directory operations.
//!
//! These are plain immutable records. Flags named `callback_*` report that a
//! conflicting request for the same key is outstanding: the caller may use
//! the access it was granted, but should expect to be asked to give it up
//! once its own transaction completes.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::NO_OBJECT;

/// Result of registering a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeResult {
    pub node_id: NodeId,
    /// Port of the node's private update-queue connection.
    pub socket_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectResults {
    pub data: Vec<u8>,
    /// Whether there is a conflicting write request.
    pub callback_evict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectForUpdateResults {
    pub data: Vec<u8>,
    /// Whether there is a conflicting write request.
    pub callback_evict: bool,
    /// Whether there is a conflicting read request.
    pub callback_downgrade: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextObjectResults {
    pub oid: i64,
    pub data: Vec<u8>,
    pub callback_evict: bool,
}

/// Result of a read lookup of a name binding.
///
/// When `found` is true, `next_name` is `None` and `oid` is bound to the
/// requested name. Otherwise `next_name` is the next bound name (or `None`
/// at the end of the namespace), `oid` is bound to that next name (or
/// [`NO_OBJECT`]), and `callback_evict` describes the next name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBindingResults {
    pub found: bool,
    pub next_name: Option<String>,
    pub oid: i64,
    pub callback_evict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBindingForUpdateResults {
    pub found: bool,
    pub next_name: Option<String>,
    pub oid: i64,
    pub callback_evict: bool,
    pub callback_downgrade: bool,
}

/// Result of acquiring access for removing a binding.
///
/// `next_name`, `next_oid` and the `next_*` flags always describe the next
/// bound name after the requested one. When `found` is false, `oid` is
/// [`NO_OBJECT`] and the flags for the requested name are false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBindingForRemoveResults {
    pub found: bool,
    pub next_name: Option<String>,
    pub oid: i64,
    pub callback_evict: bool,
    pub callback_downgrade: bool,
    pub next_oid: i64,
    pub next_callback_evict: bool,
    pub next_callback_downgrade: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextBoundNameResults {
    pub next_name: Option<String>,
    pub oid: i64,
    pub callback_evict: bool,
}

impl NextBoundNameResults {
    /// The result when no bound name follows.
    pub fn end(callback_evict: bool) -> Self {
        Self {
            next_name: None,
            oid: NO_OBJECT,
            callback_evict,
        }
    }
}

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::access::ReleaseKind;
use crate::error::CallbackError;
use crate::key::CallbackKey;
use crate::node::NodeId;

/// A request for `target` to release its access to `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub target: NodeId,
    pub key: CallbackKey,
    pub release: ReleaseKind,
}

impl CallbackRequest {
    pub fn new(target: NodeId, key: impl Into<CallbackKey>, release: ReleaseKind) -> Self {
        Self {
            target,
            key: key.into(),
            release,
        }
    }
}

impl fmt::Display for CallbackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.release, self.key, self.target)
    }
}

/// Endpoint a node registers so the server can ask it to release access.
///
/// `identity` names the physical node behind the endpoint (for remote nodes,
/// the address the server dials). Two registrations with the same identity
/// refer to the same node.
#[async_trait]
pub trait CallbackServer: Send + Sync + fmt::Debug {
    fn identity(&self) -> &str;

    /// Ask the node to release `key`. Returns once the node has acknowledged.
    async fn request_release(
        &self,
        key: &CallbackKey,
        release: ReleaseKind,
    ) -> Result<(), CallbackError>;
}

use std::sync::Arc;

use async_trait::async_trait;
use dstore_types::{
    BindingKey, CallbackServer, GetBindingForRemoveResults, GetBindingForUpdateResults,
    GetBindingResults, GetObjectForUpdateResults, GetObjectResults, NextBoundNameResults,
    NextObjectResults, NodeId, RegisterNodeResult,
};

use crate::error::{ErrorKind, ProtocolError, ProtocolResult};
use crate::message::{Request, Response};
use crate::transport::RemoteCallbackServer;

/// The directory server contract seen by application nodes.
///
/// Semantic failures come back as [`ProtocolError::Remote`]; everything else
/// is a transport failure and the whole operation may be retried.
#[async_trait]
pub trait CachingDataStoreServer: Send + Sync {
    /// Register a node. Release callbacks for it go to `callback`.
    async fn register_node(
        &self,
        callback: Arc<dyn CallbackServer>,
    ) -> ProtocolResult<RegisterNodeResult>;

    /// Reserve `count` consecutive object IDs and return the first.
    async fn new_object_ids(&self, count: i32) -> ProtocolResult<i64>;

    async fn get_object(&self, node: NodeId, oid: i64)
        -> ProtocolResult<Option<GetObjectResults>>;

    async fn get_object_for_update(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<GetObjectForUpdateResults>>;

    /// Convert read access to write access. Returns the downgrade flag.
    async fn upgrade_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool>;

    /// The first existing object after `oid` (`-1` for the first object).
    async fn next_object_id(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<NextObjectResults>>;

    async fn get_binding(&self, node: NodeId, name: &str) -> ProtocolResult<GetBindingResults>;

    async fn get_binding_for_update(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForUpdateResults>;

    async fn get_binding_for_remove(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForRemoveResults>;

    /// The first bound name after `name`, or the first name if `None`.
    async fn next_bound_name(
        &self,
        node: NodeId,
        name: Option<&str>,
    ) -> ProtocolResult<NextBoundNameResults>;

    async fn get_class_id(&self, class_info: &[u8]) -> ProtocolResult<i32>;

    async fn get_class_info(&self, class_id: i32) -> ProtocolResult<Option<Vec<u8>>>;

    /// Voluntarily give up access to an object.
    async fn release_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool>;

    /// Voluntarily give up access to a binding key.
    async fn release_binding(&self, node: NodeId, key: &BindingKey) -> ProtocolResult<bool>;

    /// The connection `node` registered over has closed.
    ///
    /// Returns `true` if this took the node from alive to dead.
    async fn node_disconnected(&self, _node: NodeId) -> ProtocolResult<bool> {
        Ok(false)
    }
}

/// Run one wire request against `server`.
///
/// Failures are folded into [`Response::Error`]; transport failures have no
/// meaning on the server side and are reported as internal errors.
pub async fn dispatch<S>(server: &S, request: Request) -> Response
where
    S: CachingDataStoreServer + ?Sized,
{
    match handle(server, request).await {
        Ok(response) => response,
        Err(ProtocolError::Remote { kind, message }) => Response::Error { kind, message },
        Err(other) => Response::Error {
            kind: ErrorKind::Internal,
            message: other.to_string(),
        },
    }
}

async fn handle<S>(server: &S, request: Request) -> ProtocolResult<Response>
where
    S: CachingDataStoreServer + ?Sized,
{
    let response = match request {
        Request::RegisterNode { callback_addr } => {
            let callback = Arc::new(RemoteCallbackServer::new(callback_addr));
            Response::Registered(server.register_node(callback).await?)
        }
        Request::NewObjectIds { count } => Response::ObjectIds {
            first: server.new_object_ids(count).await?,
        },
        Request::GetObject { node_id, oid } => {
            Response::Object(server.get_object(node_id, oid).await?)
        }
        Request::GetObjectForUpdate { node_id, oid } => {
            Response::ObjectForUpdate(server.get_object_for_update(node_id, oid).await?)
        }
        Request::UpgradeObject { node_id, oid } => Response::Upgraded {
            callback_downgrade: server.upgrade_object(node_id, oid).await?,
        },
        Request::NextObjectId { node_id, oid } => {
            Response::NextObject(server.next_object_id(node_id, oid).await?)
        }
        Request::GetBinding { node_id, name } => {
            Response::Binding(server.get_binding(node_id, &name).await?)
        }
        Request::GetBindingForUpdate { node_id, name } => {
            Response::BindingForUpdate(server.get_binding_for_update(node_id, &name).await?)
        }
        Request::GetBindingForRemove { node_id, name } => {
            Response::BindingForRemove(server.get_binding_for_remove(node_id, &name).await?)
        }
        Request::NextBoundName { node_id, name } => {
            Response::NextBoundName(server.next_bound_name(node_id, name.as_deref()).await?)
        }
        Request::GetClassId { class_info } => Response::ClassId {
            class_id: server.get_class_id(&class_info).await?,
        },
        Request::GetClassInfo { class_id } => Response::ClassInfo {
            class_info: server.get_class_info(class_id).await?,
        },
        Request::ReleaseObject { node_id, oid } => Response::Released {
            released: server.release_object(node_id, oid).await?,
        },
        Request::ReleaseBinding { node_id, key } => Response::Released {
            released: server.release_binding(node_id, &key).await?,
        },
    };
    Ok(response)
}

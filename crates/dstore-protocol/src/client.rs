use std::sync::Arc;

use async_trait::async_trait;
use dstore_types::{
    BindingKey, CallbackServer, GetBindingForRemoveResults, GetBindingForUpdateResults,
    GetBindingResults, GetObjectForUpdateResults, GetObjectResults, NextBoundNameResults,
    NextObjectResults, NodeId, RegisterNodeResult,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::codec::DstoreCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Message, Request, Response};
use crate::service::CachingDataStoreServer;

/// TCP client for a directory server.
///
/// Requests on one client are serialized over a single connection. After a
/// transport error the connection may be out of step; connect a new client.
/// Nodes registered through a client are declared dead once its connection
/// closes, so they must register again over the new one.
#[derive(Debug)]
pub struct DstoreClient {
    stream: Mutex<TcpStream>,
}

impl DstoreClient {
    pub async fn connect(addr: &str) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Send one request and wait for its response.
    pub async fn call(&self, request: Request) -> ProtocolResult<Response> {
        let mut stream = self.stream.lock().await;
        DstoreCodec::write_frame(&mut *stream, &request).await?;
        match DstoreCodec::read_frame(&mut *stream).await? {
            Some(Response::Error { kind, message }) => Err(ProtocolError::Remote { kind, message }),
            Some(response) => Ok(response),
            None => Err(ProtocolError::Framing(format!(
                "connection closed awaiting reply to {}",
                request.type_name()
            ))),
        }
    }
}

fn unexpected(expected: &'static str, got: Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        expected,
        got: got.type_name(),
    }
}

#[async_trait]
impl CachingDataStoreServer for DstoreClient {
    /// The server dials `callback.identity()` to deliver callbacks, so it
    /// must be a reachable `host:port`.
    async fn register_node(
        &self,
        callback: Arc<dyn CallbackServer>,
    ) -> ProtocolResult<RegisterNodeResult> {
        let request = Request::RegisterNode {
            callback_addr: callback.identity().to_string(),
        };
        match self.call(request).await? {
            Response::Registered(result) => Ok(result),
            other => Err(unexpected("Registered", other)),
        }
    }

    async fn new_object_ids(&self, count: i32) -> ProtocolResult<i64> {
        match self.call(Request::NewObjectIds { count }).await? {
            Response::ObjectIds { first } => Ok(first),
            other => Err(unexpected("ObjectIds", other)),
        }
    }

    async fn get_object(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<GetObjectResults>> {
        match self.call(Request::GetObject { node_id: node, oid }).await? {
            Response::Object(result) => Ok(result),
            other => Err(unexpected("Object", other)),
        }
    }

    async fn get_object_for_update(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<GetObjectForUpdateResults>> {
        match self.call(Request::GetObjectForUpdate { node_id: node, oid }).await? {
            Response::ObjectForUpdate(result) => Ok(result),
            other => Err(unexpected("ObjectForUpdate", other)),
        }
    }

    async fn upgrade_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool> {
        match self.call(Request::UpgradeObject { node_id: node, oid }).await? {
            Response::Upgraded { callback_downgrade } => Ok(callback_downgrade),
            other => Err(unexpected("Upgraded", other)),
        }
    }

    async fn next_object_id(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<NextObjectResults>> {
        match self.call(Request::NextObjectId { node_id: node, oid }).await? {
            Response::NextObject(result) => Ok(result),
            other => Err(unexpected("NextObject", other)),
        }
    }

    async fn get_binding(&self, node: NodeId, name: &str) -> ProtocolResult<GetBindingResults> {
        let request = Request::GetBinding {
            node_id: node,
            name: name.to_string(),
        };
        match self.call(request).await? {
            Response::Binding(result) => Ok(result),
            other => Err(unexpected("Binding", other)),
        }
    }

    async fn get_binding_for_update(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForUpdateResults> {
        let request = Request::GetBindingForUpdate {
            node_id: node,
            name: name.to_string(),
        };
        match self.call(request).await? {
            Response::BindingForUpdate(result) => Ok(result),
            other => Err(unexpected("BindingForUpdate", other)),
        }
    }

    async fn get_binding_for_remove(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForRemoveResults> {
        let request = Request::GetBindingForRemove {
            node_id: node,
            name: name.to_string(),
        };
        match self.call(request).await? {
            Response::BindingForRemove(result) => Ok(result),
            other => Err(unexpected("BindingForRemove", other)),
        }
    }

    async fn next_bound_name(
        &self,
        node: NodeId,
        name: Option<&str>,
    ) -> ProtocolResult<NextBoundNameResults> {
        let request = Request::NextBoundName {
            node_id: node,
            name: name.map(str::to_string),
        };
        match self.call(request).await? {
            Response::NextBoundName(result) => Ok(result),
            other => Err(unexpected("NextBoundName", other)),
        }
    }

    async fn get_class_id(&self, class_info: &[u8]) -> ProtocolResult<i32> {
        let request = Request::GetClassId {
            class_info: class_info.to_vec(),
        };
        match self.call(request).await? {
            Response::ClassId { class_id } => Ok(class_id),
            other => Err(unexpected("ClassId", other)),
        }
    }

    async fn get_class_info(&self, class_id: i32) -> ProtocolResult<Option<Vec<u8>>> {
        match self.call(Request::GetClassInfo { class_id }).await? {
            Response::ClassInfo { class_info } => Ok(class_info),
            other => Err(unexpected("ClassInfo", other)),
        }
    }

    async fn release_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool> {
        match self.call(Request::ReleaseObject { node_id: node, oid }).await? {
            Response::Released { released } => Ok(released),
            other => Err(unexpected("Released", other)),
        }
    }

    async fn release_binding(&self, node: NodeId, key: &BindingKey) -> ProtocolResult<bool> {
        let request = Request::ReleaseBinding {
            node_id: node,
            key: key.clone(),
        };
        match self.call(request).await? {
            Response::Released { released } => Ok(released),
            other => Err(unexpected("Released", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::net::TcpListener;

    /// Accept one connection and answer every request with `reply`.
    async fn canned_server(reply: Response) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(_)) = DstoreCodec::read_frame::<_, Request>(&mut stream).await {
                DstoreCodec::write_frame(&mut stream, &reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn remote_error_keeps_its_kind() {
        let addr = canned_server(Response::Error {
            kind: ErrorKind::CacheConsistency,
            message: "node-1 holds no read access".into(),
        })
        .await;
        let client = DstoreClient::connect(&addr).await.unwrap();

        let err = client.upgrade_object(NodeId::new(1), 3).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CacheConsistency));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn mismatched_reply_is_rejected() {
        let addr = canned_server(Response::ObjectIds { first: 0 }).await;
        let client = DstoreClient::connect(&addr).await.unwrap();

        assert_eq!(client.new_object_ids(4).await.unwrap(), 0);
        let err = client.get_class_id(b"descriptor").await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedResponse { expected: "ClassId", got: "ObjectIds" }
        ));
    }
}

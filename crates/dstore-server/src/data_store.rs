//! The directory facade: every node-facing operation, in process.

use std::sync::Arc;

use async_trait::async_trait;
use dstore_callback::{CallbackConfig, CallbackCoordinator, CallbackQueue};
use dstore_directory::{
    BindingIndex, ClassInfoRegistry, DirectoryError, LockDirectory, NodeInfo, NodeRegistry,
    ObjectIdAllocator,
};
use dstore_protocol::{CachingDataStoreServer, ProtocolResult};
use dstore_store::BackingStore;
use dstore_types::{
    BindingKey, CallbackServer, GetBindingForRemoveResults, GetBindingForUpdateResults,
    GetBindingResults, GetObjectForUpdateResults, GetObjectResults, NextBoundNameResults,
    NextObjectResults, NodeId, RegisterNodeResult,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ServerConfig;

/// Counters served on the admin API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub live_nodes: usize,
    pub locked_objects: usize,
    pub locked_bindings: usize,
    pub classes: usize,
    pub next_object_id: i64,
}

/// Node registry, ID allocator, class registry, both directories and the
/// callback coordinator wired together.
pub struct CachingDataStore {
    nodes: Arc<NodeRegistry>,
    ids: ObjectIdAllocator,
    classes: ClassInfoRegistry,
    objects: Arc<LockDirectory>,
    bindings: Arc<BindingIndex>,
    coordinator: Arc<CallbackCoordinator>,
    deliveries: JoinHandle<()>,
}

impl CachingDataStore {
    /// Build the directory over `store` and start callback delivery.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ServerConfig, store: Arc<dyn BackingStore>) -> Self {
        Self::with_callbacks(config.update_queue_ports.range(), config.callbacks.clone(), store)
    }

    pub fn with_callbacks(
        ports: std::ops::RangeInclusive<u16>,
        callbacks: CallbackConfig,
        store: Arc<dyn BackingStore>,
    ) -> Self {
        let nodes = Arc::new(NodeRegistry::new(ports));
        let (queue, receiver) = CallbackQueue::channel();
        let queue = Arc::new(queue);
        let objects = Arc::new(LockDirectory::new(
            Arc::clone(&nodes),
            Arc::clone(&store),
            queue.clone(),
        ));
        let bindings = Arc::new(BindingIndex::new(Arc::clone(&nodes), store, queue));
        let coordinator = Arc::new(CallbackCoordinator::new(
            callbacks,
            Arc::clone(&nodes),
            Arc::clone(&objects),
            Arc::clone(&bindings),
        ));
        let deliveries = Arc::clone(&coordinator).spawn(receiver);
        Self {
            nodes,
            ids: ObjectIdAllocator::default(),
            classes: ClassInfoRegistry::new(),
            objects,
            bindings,
            coordinator,
            deliveries,
        }
    }

    /// Declare a node dead and strip all of its access.
    pub fn node_failed(&self, node: NodeId) -> Result<bool, DirectoryError> {
        self.coordinator.node_failed(node)
    }

    pub fn nodes(&self) -> Result<Vec<NodeInfo>, DirectoryError> {
        self.nodes.nodes()
    }

    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            live_nodes: self.nodes.live_count(),
            locked_objects: self.objects.len(),
            locked_bindings: self.bindings.len(),
            classes: self.classes.len(),
            next_object_id: self.ids.peek_next(),
        }
    }

    pub fn objects(&self) -> &LockDirectory {
        &self.objects
    }

    pub fn bindings(&self) -> &BindingIndex {
        &self.bindings
    }
}

impl Drop for CachingDataStore {
    fn drop(&mut self) {
        self.deliveries.abort();
    }
}

impl std::fmt::Debug for CachingDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingDataStore")
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl CachingDataStoreServer for CachingDataStore {
    async fn register_node(
        &self,
        callback: Arc<dyn CallbackServer>,
    ) -> ProtocolResult<RegisterNodeResult> {
        let registration = self.nodes.register(callback)?;
        Ok(RegisterNodeResult {
            node_id: registration.node_id,
            socket_port: registration.update_queue_port,
        })
    }

    async fn new_object_ids(&self, count: i32) -> ProtocolResult<i64> {
        let first = self.ids.allocate(count)?;
        debug!(first, count, "allocated object ids");
        Ok(first)
    }

    async fn get_object(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<GetObjectResults>> {
        Ok(self.objects.get_object(node, oid)?)
    }

    async fn get_object_for_update(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<GetObjectForUpdateResults>> {
        Ok(self.objects.get_object_for_update(node, oid)?)
    }

    async fn upgrade_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool> {
        Ok(self.objects.upgrade_object(node, oid)?)
    }

    async fn next_object_id(
        &self,
        node: NodeId,
        oid: i64,
    ) -> ProtocolResult<Option<NextObjectResults>> {
        Ok(self.objects.next_object_id(node, oid)?)
    }

    async fn get_binding(&self, node: NodeId, name: &str) -> ProtocolResult<GetBindingResults> {
        Ok(self.bindings.get_binding(node, name)?)
    }

    async fn get_binding_for_update(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForUpdateResults> {
        Ok(self.bindings.get_binding_for_update(node, name)?)
    }

    async fn get_binding_for_remove(
        &self,
        node: NodeId,
        name: &str,
    ) -> ProtocolResult<GetBindingForRemoveResults> {
        Ok(self.bindings.get_binding_for_remove(node, name)?)
    }

    async fn next_bound_name(
        &self,
        node: NodeId,
        name: Option<&str>,
    ) -> ProtocolResult<NextBoundNameResults> {
        Ok(self.bindings.next_bound_name(node, name)?)
    }

    async fn get_class_id(&self, class_info: &[u8]) -> ProtocolResult<i32> {
        Ok(self.classes.class_id(class_info)?)
    }

    async fn get_class_info(&self, class_id: i32) -> ProtocolResult<Option<Vec<u8>>> {
        Ok(self.classes.class_info(class_id)?)
    }

    async fn release_object(&self, node: NodeId, oid: i64) -> ProtocolResult<bool> {
        if oid < 0 {
            return Err(DirectoryError::InvalidArgument(format!("object id {oid} is negative")).into());
        }
        self.nodes.check(node)?;
        Ok(self.objects.release(node, oid))
    }

    async fn release_binding(&self, node: NodeId, key: &BindingKey) -> ProtocolResult<bool> {
        self.nodes.check(node)?;
        Ok(self.bindings.release(node, key))
    }

    async fn node_disconnected(&self, node: NodeId) -> ProtocolResult<bool> {
        Ok(self.node_failed(node)?)
    }
}

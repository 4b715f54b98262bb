//! Shared fixtures for directory tests.

use std::sync::{Arc, Mutex};

use dstore_store::{BackingStore, InMemoryBackingStore, StoreResult};
use dstore_types::NodeId;

use crate::node::NodeRegistry;

/// Store that marks a chosen node dead the next time an object or a
/// next-name lookup runs, i.e. after the request's liveness check and before
/// its grant.
pub(crate) struct DyingStore {
    pub(crate) inner: InMemoryBackingStore,
    nodes: Arc<NodeRegistry>,
    victim: Mutex<Option<NodeId>>,
}

impl DyingStore {
    pub(crate) fn new(nodes: Arc<NodeRegistry>) -> Self {
        Self {
            inner: InMemoryBackingStore::new(),
            nodes,
            victim: Mutex::new(None),
        }
    }

    pub(crate) fn kill_on_lookup(&self, node: NodeId) {
        *self.victim.lock().unwrap() = Some(node);
    }

    fn strike(&self) {
        if let Some(node) = self.victim.lock().unwrap().take() {
            self.nodes.mark_dead(node).unwrap();
        }
    }
}

impl BackingStore for DyingStore {
    fn object(&self, oid: i64) -> StoreResult<Option<Vec<u8>>> {
        self.strike();
        self.inner.object(oid)
    }

    fn next_object(&self, after: i64) -> StoreResult<Option<(i64, Vec<u8>)>> {
        self.inner.next_object(after)
    }

    fn put_object(&self, oid: i64, data: Vec<u8>) -> StoreResult<()> {
        self.inner.put_object(oid, data)
    }

    fn remove_object(&self, oid: i64) -> StoreResult<bool> {
        self.inner.remove_object(oid)
    }

    fn binding(&self, name: &str) -> StoreResult<Option<i64>> {
        self.inner.binding(name)
    }

    fn next_binding(&self, after: Option<&str>) -> StoreResult<Option<(String, i64)>> {
        self.strike();
        self.inner.next_binding(after)
    }

    fn bind(&self, name: &str, oid: i64) -> StoreResult<()> {
        self.inner.bind(name, oid)
    }

    fn unbind(&self, name: &str) -> StoreResult<bool> {
        self.inner.unbind(name)
    }
}

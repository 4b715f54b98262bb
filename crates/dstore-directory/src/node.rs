//! Registration and liveness of cache nodes.

use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use dstore_types::{CallbackServer, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, Result};

/// Management snapshot of a single node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: NodeId,
    /// Identity of the node's callback endpoint.
    pub identity: String,
    /// Port assigned for the node's update-queue connection.
    pub update_queue_port: u16,
    /// Once false, never true again.
    pub alive: bool,
    pub registered_at: DateTime<Utc>,
}

/// Result of a successful registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration {
    pub node_id: NodeId,
    pub update_queue_port: u16,
}

struct NodeRecord {
    info: NodeInfo,
    callback: Arc<dyn CallbackServer>,
}

struct RegistryState {
    next_id: u64,
    nodes: HashMap<NodeId, NodeRecord>,
    /// Identity -> node, for live nodes only.
    live: HashMap<String, NodeId>,
    free_ports: BTreeSet<u16>,
}

/// Table of every node that ever registered.
///
/// Node IDs are assigned in increasing order starting at 1 and are never
/// reused. Each live node owns one update-queue port from the configured
/// range; the port returns to the pool when the node is marked dead.
pub struct NodeRegistry {
    ports: RangeInclusive<u16>,
    state: RwLock<RegistryState>,
}

impl NodeRegistry {
    /// Create a registry that assigns update-queue ports from `ports`.
    pub fn new(ports: RangeInclusive<u16>) -> Self {
        let free_ports = ports.clone().collect();
        Self {
            ports,
            state: RwLock::new(RegistryState {
                next_id: 1,
                nodes: HashMap::new(),
                live: HashMap::new(),
                free_ports,
            }),
        }
    }

    /// Register a node reachable through `callback`.
    ///
    /// Fails with [`DirectoryError::DuplicateRegistration`] if a live node
    /// already registered the same callback identity.
    pub fn register(&self, callback: Arc<dyn CallbackServer>) -> Result<Registration> {
        let identity = callback.identity().to_string();
        let mut state = self.write()?;

        if let Some(existing) = state.live.get(&identity) {
            return Err(DirectoryError::DuplicateRegistration {
                identity,
                existing: *existing,
            });
        }
        let port = state
            .free_ports
            .pop_first()
            .ok_or_else(|| DirectoryError::PortsExhausted {
                first: *self.ports.start(),
                last: *self.ports.end(),
            })?;

        let node_id = NodeId::new(state.next_id);
        state.next_id += 1;
        state.live.insert(identity.clone(), node_id);
        state.nodes.insert(
            node_id,
            NodeRecord {
                info: NodeInfo {
                    node_id,
                    identity: identity.clone(),
                    update_queue_port: port,
                    alive: true,
                    registered_at: Utc::now(),
                },
                callback,
            },
        );
        tracing::info!(%node_id, %identity, port, "registered node");
        Ok(Registration {
            node_id,
            update_queue_port: port,
        })
    }

    /// Whether `node` is registered and alive.
    pub fn is_registered(&self, node: NodeId) -> bool {
        self.check(node).is_ok()
    }

    /// Fail with [`DirectoryError::UnknownNode`] unless `node` is alive.
    pub fn check(&self, node: NodeId) -> Result<()> {
        let state = self.read()?;
        if state.nodes.get(&node).is_some_and(|r| r.info.alive) {
            Ok(())
        } else {
            Err(DirectoryError::UnknownNode(node))
        }
    }

    /// The callback endpoint of a live node.
    pub fn callback(&self, node: NodeId) -> Result<Option<Arc<dyn CallbackServer>>> {
        let state = self.read()?;
        Ok(state
            .nodes
            .get(&node)
            .filter(|r| r.info.alive)
            .map(|r| Arc::clone(&r.callback)))
    }

    /// Mark `node` dead and return its port to the pool.
    ///
    /// Returns `true` if the node was alive. The caller is responsible for
    /// stripping the node's access from the directories.
    pub fn mark_dead(&self, node: NodeId) -> Result<bool> {
        let mut state = self.write()?;
        let Some(record) = state.nodes.get_mut(&node) else {
            return Ok(false);
        };
        if !record.info.alive {
            return Ok(false);
        }
        record.info.alive = false;
        let identity = record.info.identity.clone();
        let port = record.info.update_queue_port;
        state.live.remove(&identity);
        state.free_ports.insert(port);
        tracing::warn!(%node, %identity, "node marked dead");
        Ok(true)
    }

    /// Snapshot of every node, ordered by ID.
    pub fn nodes(&self) -> Result<Vec<NodeInfo>> {
        let state = self.read()?;
        let mut nodes: Vec<NodeInfo> = state.nodes.values().map(|r| r.info.clone()).collect();
        nodes.sort_by_key(|info| info.node_id);
        Ok(nodes)
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.read().map(|state| state.live.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state.write().map_err(poisoned)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> DirectoryError {
    DirectoryError::LockPoisoned(e.to_string())
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("ports", &self.ports)
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use dstore_types::{CallbackError, CallbackKey, ReleaseKind};

    /// Endpoint that acknowledges every request.
    #[derive(Debug)]
    pub(crate) struct StubEndpoint(pub String);

    #[async_trait]
    impl CallbackServer for StubEndpoint {
        fn identity(&self) -> &str {
            &self.0
        }

        async fn request_release(
            &self,
            _key: &CallbackKey,
            _release: ReleaseKind,
        ) -> std::result::Result<(), CallbackError> {
            Ok(())
        }
    }

    pub(crate) fn endpoint(identity: &str) -> Arc<dyn CallbackServer> {
        Arc::new(StubEndpoint(identity.to_string()))
    }

    #[test]
    fn ids_and_ports_are_assigned_in_order() {
        let nodes = NodeRegistry::new(7000..=7010);
        let a = nodes.register(endpoint("a")).unwrap();
        let b = nodes.register(endpoint("b")).unwrap();
        assert_eq!(a.node_id, NodeId::new(1));
        assert_eq!(a.update_queue_port, 7000);
        assert_eq!(b.node_id, NodeId::new(2));
        assert_eq!(b.update_queue_port, 7001);
        assert!(nodes.is_registered(a.node_id));
        assert_eq!(nodes.live_count(), 2);
    }

    #[test]
    fn duplicate_identity_rejected_while_alive() {
        let nodes = NodeRegistry::new(7000..=7010);
        let a = nodes.register(endpoint("host:1")).unwrap();
        let err = nodes.register(endpoint("host:1")).unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::DuplicateRegistration { existing, .. } if existing == a.node_id
        ));
    }

    #[test]
    fn dead_identity_may_register_again_with_new_id() {
        let nodes = NodeRegistry::new(7000..=7010);
        let a = nodes.register(endpoint("host:1")).unwrap();
        assert!(nodes.mark_dead(a.node_id).unwrap());
        let again = nodes.register(endpoint("host:1")).unwrap();
        assert_ne!(again.node_id, a.node_id);
        assert!(!nodes.is_registered(a.node_id));
        assert!(nodes.is_registered(again.node_id));
    }

    #[test]
    fn unknown_and_dead_nodes_fail_check() {
        let nodes = NodeRegistry::new(7000..=7010);
        assert!(matches!(
            nodes.check(NodeId::new(99)),
            Err(DirectoryError::UnknownNode(_))
        ));
        let a = nodes.register(endpoint("a")).unwrap();
        nodes.mark_dead(a.node_id).unwrap();
        assert!(matches!(nodes.check(a.node_id), Err(DirectoryError::UnknownNode(_))));
        assert!(nodes.callback(a.node_id).unwrap().is_none());
    }

    #[test]
    fn mark_dead_is_idempotent() {
        let nodes = NodeRegistry::new(7000..=7010);
        let a = nodes.register(endpoint("a")).unwrap();
        assert!(nodes.mark_dead(a.node_id).unwrap());
        assert!(!nodes.mark_dead(a.node_id).unwrap());
        assert!(!nodes.mark_dead(NodeId::new(42)).unwrap());
    }

    #[test]
    fn ports_are_recycled_and_exhaust() {
        let nodes = NodeRegistry::new(7000..=7001);
        let a = nodes.register(endpoint("a")).unwrap();
        nodes.register(endpoint("b")).unwrap();
        let err = nodes.register(endpoint("c")).unwrap_err();
        assert!(matches!(err, DirectoryError::PortsExhausted { first: 7000, last: 7001 }));

        nodes.mark_dead(a.node_id).unwrap();
        let c = nodes.register(endpoint("c")).unwrap();
        assert_eq!(c.update_queue_port, 7000);
    }

    #[test]
    fn snapshot_keeps_dead_nodes() {
        let nodes = NodeRegistry::new(7000..=7010);
        let a = nodes.register(endpoint("a")).unwrap();
        nodes.register(endpoint("b")).unwrap();
        nodes.mark_dead(a.node_id).unwrap();
        let infos = nodes.nodes().unwrap();
        assert_eq!(infos.len(), 2);
        assert!(!infos[0].alive);
        assert!(infos[1].alive);
        assert_eq!(infos[1].identity, "b");
    }

    #[test]
    fn poisoned_registry_reports_errors() {
        let nodes = Arc::new(NodeRegistry::new(7000..=7010));
        let a = nodes.register(endpoint("a")).unwrap();
        let poisoner = Arc::clone(&nodes);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison the registry");
        })
        .join();

        assert!(matches!(nodes.check(a.node_id), Err(DirectoryError::LockPoisoned(_))));
        assert!(!nodes.is_registered(a.node_id));
        assert!(matches!(nodes.register(endpoint("b")), Err(DirectoryError::LockPoisoned(_))));
        assert!(matches!(nodes.mark_dead(a.node_id), Err(DirectoryError::LockPoisoned(_))));
        assert!(nodes.nodes().is_err());
        assert!(nodes.callback(a.node_id).is_err());
        assert_eq!(nodes.live_count(), 0);
    }
}

//! Access arbitration for objects.

use std::sync::Arc;

use dashmap::DashMap;
use dstore_store::BackingStore;
use dstore_types::{
    AccessMode, CallbackKey, CallbackRequest, GetObjectForUpdateResults, GetObjectResults,
    NextObjectResults, NodeId, ReleaseKind, NO_OBJECT,
};

use crate::access::{AccessEntry, Conflicts};
use crate::error::{DirectoryError, Result};
use crate::node::NodeRegistry;
use crate::sink::CallbackSink;

/// Directory of read/write access to objects, keyed by object ID.
///
/// Every object ID is its own unit of mutual exclusion: a grant locks only
/// the shard holding that ID's entry, decides, updates, and unlocks before
/// any callback is submitted. Entries exist only while some node holds or is
/// releasing access.
pub struct LockDirectory {
    entries: DashMap<i64, AccessEntry>,
    nodes: Arc<NodeRegistry>,
    store: Arc<dyn BackingStore>,
    callbacks: Arc<dyn CallbackSink>,
}

impl LockDirectory {
    pub fn new(
        nodes: Arc<NodeRegistry>,
        store: Arc<dyn BackingStore>,
        callbacks: Arc<dyn CallbackSink>,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            nodes,
            store,
            callbacks,
        }
    }

    /// Obtain read access to an object. Returns `None` if it does not exist.
    pub fn get_object(&self, node: NodeId, oid: i64) -> Result<Option<GetObjectResults>> {
        check_oid(oid)?;
        self.nodes.check(node)?;
        let Some(data) = self.store.object(oid)? else {
            return Ok(None);
        };
        let conflicts = self.grant(node, oid, AccessMode::Read)?;
        Ok(Some(GetObjectResults {
            data,
            callback_evict: conflicts.evict,
        }))
    }

    /// Obtain write access to an object. Returns `None` if it does not exist.
    pub fn get_object_for_update(
        &self,
        node: NodeId,
        oid: i64,
    ) -> Result<Option<GetObjectForUpdateResults>> {
        check_oid(oid)?;
        self.nodes.check(node)?;
        let Some(data) = self.store.object(oid)? else {
            return Ok(None);
        };
        let conflicts = self.grant(node, oid, AccessMode::Write)?;
        Ok(Some(GetObjectForUpdateResults {
            data,
            callback_evict: conflicts.evict,
            callback_downgrade: conflicts.downgrade,
        }))
    }

    /// Upgrade `node`'s read access to write access.
    ///
    /// Returns whether other readers had to be asked to downgrade.
    pub fn upgrade_object(&self, node: NodeId, oid: i64) -> Result<bool> {
        check_oid(oid)?;
        self.nodes.check(node)?;
        let grant = match self.entries.get_mut(&oid) {
            Some(mut entry) => {
                self.nodes.check(node)?;
                entry.upgrade(node)
            }
            None => None,
        };
        let grant = grant.ok_or_else(|| DirectoryError::CacheConsistency {
            node,
            key: CallbackKey::Object(oid),
            reason: "upgrade requested without read access".into(),
        })?;
        self.issue(oid, &grant.releases);
        Ok(grant.conflicts.downgrade)
    }

    /// Obtain read access to the first existing object after `oid`.
    ///
    /// Pass [`NO_OBJECT`] to start from the first object. Objects created
    /// after an iteration began may or may not be returned.
    pub fn next_object_id(&self, node: NodeId, oid: i64) -> Result<Option<NextObjectResults>> {
        if oid < NO_OBJECT {
            return Err(DirectoryError::invalid(format!(
                "object ID must be -1 or greater, got {oid}"
            )));
        }
        self.nodes.check(node)?;
        let Some((next, data)) = self.store.next_object(oid)? else {
            return Ok(None);
        };
        let conflicts = self.grant(node, next, AccessMode::Read)?;
        Ok(Some(NextObjectResults {
            oid: next,
            data,
            callback_evict: conflicts.evict,
        }))
    }

    /// Give up `node`'s access to `oid`. Returns `true` if it held any.
    pub fn release(&self, node: NodeId, oid: i64) -> bool {
        let released = self
            .entries
            .get_mut(&oid)
            .is_some_and(|mut entry| entry.release(node));
        self.prune(oid);
        released
    }

    /// Record that `node` acknowledged a release request for `oid`.
    pub fn complete_release(&self, node: NodeId, oid: i64) -> bool {
        let completed = self
            .entries
            .get_mut(&oid)
            .is_some_and(|mut entry| entry.complete_release(node));
        self.prune(oid);
        completed
    }

    /// Strip `node` from every entry. Returns how many entries it appeared in.
    pub fn force_release_node(&self, node: NodeId) -> usize {
        let mut affected = 0;
        self.entries.retain(|_, entry| {
            if entry.force_release(node) {
                affected += 1;
            }
            !entry.is_empty()
        });
        if affected > 0 {
            tracing::info!(%node, affected, "force-released object access");
        }
        affected
    }

    /// Current holders of `oid`.
    pub fn holders(&self, oid: i64) -> Vec<(NodeId, AccessMode)> {
        self.entries
            .get(&oid)
            .map(|entry| entry.holders().collect())
            .unwrap_or_default()
    }

    /// Nodes with an unacknowledged release request for `oid`.
    pub fn releasing(&self, oid: i64) -> Vec<(NodeId, ReleaseKind)> {
        self.entries
            .get(&oid)
            .map(|entry| entry.releasing().collect())
            .unwrap_or_default()
    }

    /// Number of objects with tracked access.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Liveness is checked under the entry lock, so a node that died while
    /// its request was in flight displaces nobody. A node marked dead after
    /// the check is stripped by `force_release_node` once the lock is free.
    fn grant(&self, node: NodeId, oid: i64, mode: AccessMode) -> Result<Conflicts> {
        let mut entry = self.entries.entry(oid).or_default();
        if let Err(error) = self.nodes.check(node) {
            drop(entry);
            self.prune(oid);
            return Err(error);
        }
        let grant = entry.grant(node, mode);
        drop(entry);
        self.issue(oid, &grant.releases);
        Ok(grant.conflicts)
    }

    fn issue(&self, oid: i64, releases: &[(NodeId, ReleaseKind)]) {
        for (target, release) in releases {
            tracing::debug!(%target, oid, %release, "requesting object release");
            self.callbacks
                .submit(CallbackRequest::new(*target, CallbackKey::Object(oid), *release));
        }
    }

    fn prune(&self, oid: i64) {
        self.entries.remove_if(&oid, |_, entry| entry.is_empty());
    }
}

impl std::fmt::Debug for LockDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockDirectory")
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn check_oid(oid: i64) -> Result<()> {
    if oid < 0 {
        return Err(DirectoryError::invalid(format!(
            "object ID must not be negative, got {oid}"
        )));
    }
    Ok(())
}

//! Access arbitration for the ordered name-binding namespace.
//!
//! Every query resolves to "the name, or the nearest bound name after it".
//! Access is taken on whichever entry the query resolved to, so a node that
//! learned "nothing is bound between X and Y" holds access on Y, and anyone
//! binding a name in that gap must first displace it. Running off the end of
//! the namespace resolves to [`BindingKey::End`].

use std::sync::Arc;

use dashmap::DashMap;
use dstore_store::BackingStore;
use dstore_types::{
    AccessMode, BindingKey, CallbackRequest, GetBindingForRemoveResults,
    GetBindingForUpdateResults, GetBindingResults, NextBoundNameResults, NodeId, ReleaseKind,
    NO_OBJECT,
};

use crate::access::{AccessEntry, Conflicts};
use crate::error::{DirectoryError, Result};
use crate::node::NodeRegistry;
use crate::sink::CallbackSink;

/// Where a name lookup landed.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Resolved {
    found: bool,
    key: BindingKey,
    oid: i64,
}

impl Resolved {
    fn next(next: Option<(String, i64)>) -> Self {
        match next {
            Some((name, oid)) => Self {
                found: false,
                key: BindingKey::Name(name),
                oid,
            },
            None => Self {
                found: false,
                key: BindingKey::End,
                oid: NO_OBJECT,
            },
        }
    }

    fn next_name(&self) -> Option<String> {
        if self.found {
            None
        } else {
            self.key.as_name().map(str::to_string)
        }
    }
}

/// Directory of read/write access to name bindings.
pub struct BindingIndex {
    entries: DashMap<BindingKey, AccessEntry>,
    nodes: Arc<NodeRegistry>,
    store: Arc<dyn BackingStore>,
    callbacks: Arc<dyn CallbackSink>,
}

impl BindingIndex {
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

    /// Obtain read access to `name`, or to the next bound name if unbound.
    pub fn get_binding(&self, node: NodeId, name: &str) -> Result<GetBindingResults> {
        self.nodes.check(node)?;
        let resolved = self.resolve(name)?;
        let conflicts = self.grant(node, &resolved.key, AccessMode::Read)?;
        Ok(GetBindingResults {
            found: resolved.found,
            next_name: resolved.next_name(),
            oid: resolved.oid,
            callback_evict: conflicts.evict,
        })
    }

    /// Obtain write access to `name`, or to the next bound name if unbound.
    pub fn get_binding_for_update(
        &self,
        node: NodeId,
        name: &str,
    ) -> Result<GetBindingForUpdateResults> {
        self.nodes.check(node)?;
        let resolved = self.resolve(name)?;
        let conflicts = self.grant(node, &resolved.key, AccessMode::Write)?;
        Ok(GetBindingForUpdateResults {
            found: resolved.found,
            next_name: resolved.next_name(),
            oid: resolved.oid,
            callback_evict: conflicts.evict,
            callback_downgrade: conflicts.downgrade,
        })
    }

    /// Obtain the access needed to remove the binding for `name`.
    ///
    /// Takes write access on `name` if it is bound, and always takes write
    /// access on the next bound name: removing `name` changes what lookups
    /// between the previous name and the next one resolve to.
    pub fn get_binding_for_remove(
        &self,
        node: NodeId,
        name: &str,
    ) -> Result<GetBindingForRemoveResults> {
        self.nodes.check(node)?;
        let bound = self.store.binding(name)?;
        let (oid, target) = match bound {
            Some(oid) => (
                oid,
                self.grant(node, &BindingKey::name(name), AccessMode::Write)?,
            ),
            None => (NO_OBJECT, Conflicts::default()),
        };

        let locked_next = self
            .store
            .next_binding(Some(name))
            .map_err(DirectoryError::from)
            .map(Resolved::next)
            .and_then(|next| {
                let conflicts = self.grant(node, &next.key, AccessMode::Write)?;
                Ok((next, conflicts))
            });
        let (next, next_conflicts) = match locked_next {
            Ok(locked) => locked,
            Err(error) => {
                if bound.is_some() {
                    self.release(node, &BindingKey::name(name));
                }
                return Err(error);
            }
        };

        Ok(GetBindingForRemoveResults {
            found: bound.is_some(),
            next_name: next.next_name(),
            oid,
            callback_evict: target.evict,
            callback_downgrade: target.downgrade,
            next_oid: next.oid,
            next_callback_evict: next_conflicts.evict,
            next_callback_downgrade: next_conflicts.downgrade,
        })
    }

    /// Obtain read access to the first bound name after `name`.
    ///
    /// Pass `None` to start from the beginning of the namespace.
    pub fn next_bound_name(&self, node: NodeId, name: Option<&str>) -> Result<NextBoundNameResults> {
        self.nodes.check(node)?;
        let next = Resolved::next(self.store.next_binding(name)?);
        let conflicts = self.grant(node, &next.key, AccessMode::Read)?;
        Ok(NextBoundNameResults {
            next_name: next.next_name(),
            oid: next.oid,
            callback_evict: conflicts.evict,
        })
    }

    /// Give up `node`'s access to `key`. Returns `true` if it held any.
    pub fn release(&self, node: NodeId, key: &BindingKey) -> bool {
        let released = self
            .entries
            .get_mut(key)
            .is_some_and(|mut entry| entry.release(node));
        self.prune(key);
        released
    }

    /// Record that `node` acknowledged a release request for `key`.
    pub fn complete_release(&self, node: NodeId, key: &BindingKey) -> bool {
        let completed = self
            .entries
            .get_mut(key)
            .is_some_and(|mut entry| entry.complete_release(node));
        self.prune(key);
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
            tracing::info!(%node, affected, "force-released binding access");
        }
        affected
    }

    /// Current holders of `key`.
    pub fn holders(&self, key: &BindingKey) -> Vec<(NodeId, AccessMode)> {
        self.entries
            .get(key)
            .map(|entry| entry.holders().collect())
            .unwrap_or_default()
    }

    /// Nodes with an unacknowledged release request for `key`.
    pub fn releasing(&self, key: &BindingKey) -> Vec<(NodeId, ReleaseKind)> {
        self.entries
            .get(key)
            .map(|entry| entry.releasing().collect())
            .unwrap_or_default()
    }

    /// Number of keys with tracked access.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, name: &str) -> Result<Resolved> {
        if let Some(oid) = self.store.binding(name)? {
            return Ok(Resolved {
                found: true,
                key: BindingKey::name(name),
                oid,
            });
        }
        Ok(Resolved::next(self.store.next_binding(Some(name))?))
    }

    fn grant(&self, node: NodeId, key: &BindingKey, mode: AccessMode) -> Result<Conflicts> {
        let mut entry = self.entries.entry(key.clone()).or_default();
        if let Err(error) = self.nodes.check(node) {
            drop(entry);
            self.prune(key);
            return Err(error);
        }
        let grant = entry.grant(node, mode);
        drop(entry);
        for (target, release) in &grant.releases {
            tracing::debug!(%target, %key, %release, "requesting binding release");
            self.callbacks
                .submit(CallbackRequest::new(*target, key.clone(), *release));
        }
        Ok(grant.conflicts)
    }

    fn prune(&self, key: &BindingKey) {
        self.entries.remove_if(key, |_, entry| entry.is_empty());
    }
}

impl std::fmt::Debug for BindingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingIndex")
            .field("entries", &self.entries.len())
            .finish()
    }
}

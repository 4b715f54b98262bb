//! Per-key holder sets and the grant rules shared by objects and bindings.
//!
//! An [`AccessEntry`] tracks, for one key, which nodes hold access and which
//! nodes have been asked to give access up. Granting access that conflicts
//! with a current holder moves that holder out of the effective set and into
//! the releasing set in the same step, so the effective set always satisfies
//! the mutual-exclusion rule: at most one writer, and never a writer
//! together with readers.

use std::collections::BTreeMap;

use dstore_types::{AccessMode, NodeId, ReleaseKind};

/// Conflicts reported to the node a grant was made to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Conflicts {
    /// A conflicting writer was displaced, or an eviction is still outstanding.
    pub evict: bool,
    /// Conflicting readers were displaced, or a downgrade is still outstanding.
    pub downgrade: bool,
}

/// Outcome of a grant: the flags for the requester plus the callbacks to issue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grant {
    pub conflicts: Conflicts,
    pub releases: Vec<(NodeId, ReleaseKind)>,
}

/// Holder and releasing sets for a single key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessEntry {
    holders: BTreeMap<NodeId, AccessMode>,
    releasing: BTreeMap<NodeId, ReleaseKind>,
}

impl AccessEntry {
    /// Grant `mode` to `node`, displacing whoever conflicts with it.
    ///
    /// A read request displaces another node's write access with an
    /// eviction. A write request displaces every other holder: writers are
    /// evicted, readers are asked to downgrade. A node that already holds
    /// write access keeps it when it asks for read access.
    pub fn grant(&mut self, node: NodeId, mode: AccessMode) -> Grant {
        let displaced: Vec<(NodeId, ReleaseKind)> = self
            .holders
            .iter()
            .filter(|(holder, held)| **holder != node && (mode.is_write() || held.is_write()))
            .map(|(holder, held)| {
                let release = if held.is_write() {
                    ReleaseKind::Evict
                } else {
                    ReleaseKind::Downgrade
                };
                (*holder, release)
            })
            .collect();

        let mut conflicts = self.pending_conflicts(node);
        for (holder, release) in &displaced {
            self.holders.remove(holder);
            self.mark_releasing(*holder, *release);
            match release {
                ReleaseKind::Evict => conflicts.evict = true,
                ReleaseKind::Downgrade => conflicts.downgrade = true,
            }
        }

        let held = self.holders.entry(node).or_insert(mode);
        *held = (*held).max(mode);
        debug_assert!(self.is_consistent());

        Grant {
            conflicts,
            releases: displaced,
        }
    }

    /// Convert `node`'s read access into write access.
    ///
    /// Returns `None` if `node` does not currently hold read access; the
    /// entry is left untouched in that case.
    pub fn upgrade(&mut self, node: NodeId) -> Option<Grant> {
        match self.holders.get(&node) {
            Some(AccessMode::Read) => Some(self.grant(node, AccessMode::Write)),
            _ => None,
        }
    }

    /// Drop `node`'s access. Returns `true` if it held any.
    pub fn release(&mut self, node: NodeId) -> bool {
        self.holders.remove(&node).is_some()
    }

    /// Record that `node` acknowledged a release request.
    pub fn complete_release(&mut self, node: NodeId) -> bool {
        self.releasing.remove(&node).is_some()
    }

    /// Strip every trace of `node` from this entry.
    pub fn force_release(&mut self, node: NodeId) -> bool {
        let held = self.holders.remove(&node).is_some();
        let releasing = self.releasing.remove(&node).is_some();
        held || releasing
    }

    pub fn holder(&self, node: NodeId) -> Option<AccessMode> {
        self.holders.get(&node).copied()
    }

    pub fn holders(&self) -> impl Iterator<Item = (NodeId, AccessMode)> + '_ {
        self.holders.iter().map(|(node, mode)| (*node, *mode))
    }

    pub fn releasing(&self) -> impl Iterator<Item = (NodeId, ReleaseKind)> + '_ {
        self.releasing.iter().map(|(node, kind)| (*node, *kind))
    }

    /// Whether the entry tracks nothing and can be dropped.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.releasing.is_empty()
    }

    /// At most one writer, and a writer excludes every reader.
    pub fn is_consistent(&self) -> bool {
        let writers = self.holders.values().filter(|m| m.is_write()).count();
        writers == 0 || (writers == 1 && self.holders.len() == 1)
    }

    fn mark_releasing(&mut self, node: NodeId, release: ReleaseKind) {
        let pending = self.releasing.entry(node).or_insert(release);
        *pending = (*pending).max(release);
    }

    fn pending_conflicts(&self, requester: NodeId) -> Conflicts {
        let mut conflicts = Conflicts::default();
        for (node, release) in &self.releasing {
            if *node == requester {
                continue;
            }
            match release {
                ReleaseKind::Evict => conflicts.evict = true,
                ReleaseKind::Downgrade => conflicts.downgrade = true,
            }
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeId = NodeId::new(1);
    const B: NodeId = NodeId::new(2);
    const C: NodeId = NodeId::new(3);

    #[test]
    fn readers_share() {
        let mut entry = AccessEntry::default();
        assert_eq!(entry.grant(A, AccessMode::Read), Grant::default());
        assert_eq!(entry.grant(B, AccessMode::Read), Grant::default());
        assert_eq!(entry.holder(A), Some(AccessMode::Read));
        assert_eq!(entry.holder(B), Some(AccessMode::Read));
    }

    #[test]
    fn read_evicts_other_writer() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        let grant = entry.grant(B, AccessMode::Read);
        assert!(grant.conflicts.evict);
        assert!(!grant.conflicts.downgrade);
        assert_eq!(grant.releases, vec![(A, ReleaseKind::Evict)]);
        assert_eq!(entry.holder(A), None);
        assert_eq!(entry.holder(B), Some(AccessMode::Read));
        assert_eq!(entry.releasing().collect::<Vec<_>>(), vec![(A, ReleaseKind::Evict)]);
    }

    #[test]
    fn write_downgrades_other_readers_only() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Read);
        entry.grant(B, AccessMode::Read);
        entry.grant(C, AccessMode::Read);
        let grant = entry.grant(A, AccessMode::Write);
        assert!(grant.conflicts.downgrade);
        assert!(!grant.conflicts.evict);
        assert_eq!(
            grant.releases,
            vec![(B, ReleaseKind::Downgrade), (C, ReleaseKind::Downgrade)]
        );
        assert_eq!(entry.holders().collect::<Vec<_>>(), vec![(A, AccessMode::Write)]);
    }

    #[test]
    fn write_evicts_other_writer() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        let grant = entry.grant(B, AccessMode::Write);
        assert!(grant.conflicts.evict);
        assert_eq!(grant.releases, vec![(A, ReleaseKind::Evict)]);
    }

    #[test]
    fn writer_keeps_write_on_read_request() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        let grant = entry.grant(A, AccessMode::Read);
        assert_eq!(grant, Grant::default());
        assert_eq!(entry.holder(A), Some(AccessMode::Write));
    }

    #[test]
    fn outstanding_release_flags_later_requesters() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        entry.grant(B, AccessMode::Read);
        let grant = entry.grant(C, AccessMode::Read);
        assert!(grant.conflicts.evict, "eviction of A is still outstanding");
        assert!(grant.releases.is_empty());

        assert!(entry.complete_release(A));
        let grant = entry.grant(C, AccessMode::Read);
        assert!(!grant.conflicts.evict);
    }

    #[test]
    fn own_pending_release_is_not_a_conflict() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        entry.grant(B, AccessMode::Read);
        let grant = entry.grant(A, AccessMode::Read);
        assert!(!grant.conflicts.evict);
    }

    #[test]
    fn upgrade_requires_read() {
        let mut entry = AccessEntry::default();
        assert!(entry.upgrade(A).is_none());
        entry.grant(A, AccessMode::Write);
        assert!(entry.upgrade(A).is_none());

        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Read);
        entry.grant(B, AccessMode::Read);
        let grant = entry.upgrade(A).unwrap();
        assert!(grant.conflicts.downgrade);
        assert_eq!(entry.holder(A), Some(AccessMode::Write));
        assert_eq!(entry.holder(B), None);
    }

    #[test]
    fn force_release_clears_holder_and_pending() {
        let mut entry = AccessEntry::default();
        entry.grant(A, AccessMode::Write);
        entry.grant(B, AccessMode::Read);
        assert!(entry.force_release(A));
        assert!(entry.force_release(B));
        assert!(entry.is_empty());
        assert!(!entry.force_release(C));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Grant(u64, bool),
            Upgrade(u64),
            Release(u64),
            Ack(u64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u64..5, any::<bool>()).prop_map(|(n, w)| Op::Grant(n, w)),
                (1u64..5).prop_map(Op::Upgrade),
                (1u64..5).prop_map(Op::Release),
                (1u64..5).prop_map(Op::Ack),
            ]
        }

        proptest! {
            #[test]
            fn mutual_exclusion_holds(ops in proptest::collection::vec(op(), 1..64)) {
                let mut entry = AccessEntry::default();
                for op in ops {
                    match op {
                        Op::Grant(n, write) => {
                            let mode = if write { AccessMode::Write } else { AccessMode::Read };
                            entry.grant(NodeId::new(n), mode);
                            prop_assert!(entry.holder(NodeId::new(n)).is_some());
                        }
                        Op::Upgrade(n) => {
                            entry.upgrade(NodeId::new(n));
                        }
                        Op::Release(n) => {
                            entry.release(NodeId::new(n));
                        }
                        Op::Ack(n) => {
                            entry.complete_release(NodeId::new(n));
                        }
                    }
                    prop_assert!(entry.is_consistent());
                }
            }
        }
    }
}

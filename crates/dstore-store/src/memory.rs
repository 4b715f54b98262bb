//! In-memory backing store for tests and embedding.
//!
//! [`InMemoryBackingStore`] keeps objects and bindings in `BTreeMap`s behind
//! `RwLock`s, which gives ordered "next" queries for free.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::BackingStore;

/// An in-memory implementation of [`BackingStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackingStore {
    objects: RwLock<BTreeMap<i64, Vec<u8>>>,
    bindings: RwLock<BTreeMap<String, i64>>,
}

impl InMemoryBackingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Number of bound names.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

fn check_oid(oid: i64) -> StoreResult<()> {
    if oid < 0 {
        return Err(StoreError::InvalidObjectId(oid));
    }
    Ok(())
}

impl BackingStore for InMemoryBackingStore {
    fn object(&self, oid: i64) -> StoreResult<Option<Vec<u8>>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.get(&oid).cloned())
    }

    fn next_object(&self, after: i64) -> StoreResult<Option<(i64, Vec<u8>)>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects
            .range((Bound::Excluded(after), Bound::Unbounded))
            .next()
            .map(|(oid, data)| (*oid, data.clone())))
    }

    fn put_object(&self, oid: i64, data: Vec<u8>) -> StoreResult<()> {
        check_oid(oid)?;
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert(oid, data);
        Ok(())
    }

    fn remove_object(&self, oid: i64) -> StoreResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        Ok(objects.remove(&oid).is_some())
    }

    fn binding(&self, name: &str) -> StoreResult<Option<i64>> {
        let bindings = self.bindings.read().map_err(poisoned)?;
        Ok(bindings.get(name).copied())
    }

    fn next_binding(&self, after: Option<&str>) -> StoreResult<Option<(String, i64)>> {
        let bindings = self.bindings.read().map_err(poisoned)?;
        let lower = match after {
            Some(name) => Bound::Excluded(name),
            None => Bound::Unbounded,
        };
        Ok(bindings
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(name, oid)| (name.clone(), *oid)))
    }

    fn bind(&self, name: &str, oid: i64) -> StoreResult<()> {
        check_oid(oid)?;
        let mut bindings = self.bindings.write().map_err(poisoned)?;
        if let Some(previous) = bindings.insert(name.to_string(), oid) {
            tracing::debug!(name, previous, oid, "rebound name");
        }
        Ok(())
    }

    fn unbind(&self, name: &str) -> StoreResult<bool> {
        let mut bindings = self.bindings.write().map_err(poisoned)?;
        Ok(bindings.remove(name).is_some())
    }
}

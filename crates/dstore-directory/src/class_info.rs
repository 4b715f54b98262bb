//! Interning of serialized class descriptors.
//!
//! Descriptors are opaque byte blobs. Identical bytes always map to the same
//! positive class ID, and the mapping never changes once made.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{DirectoryError, Result};

/// Content-addressed registry of class descriptors.
#[derive(Debug)]
pub struct ClassInfoRegistry {
    ids: DashMap<Arc<[u8]>, i32>,
    infos: DashMap<i32, Arc<[u8]>>,
    next_id: AtomicI32,
}

impl ClassInfoRegistry {
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    fn with_first_id(first: i32) -> Self {
        Self {
            ids: DashMap::new(),
            infos: DashMap::new(),
            next_id: AtomicI32::new(first),
        }
    }

    /// Return the ID for `class_info`, assigning the next unused one on first use.
    ///
    /// Racing first uses of the same bytes serialize on the entry for those
    /// bytes, so exactly one ID is ever assigned to them. The reverse mapping
    /// is in place before the ID is visible to anyone.
    pub fn class_id(&self, class_info: &[u8]) -> Result<i32> {
        if let Some(id) = self.ids.get(class_info) {
            return Ok(*id);
        }
        let key: Arc<[u8]> = Arc::from(class_info);
        match self.ids.entry(Arc::clone(&key)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let id = self
                    .next_id
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
                    .map_err(|_| DirectoryError::invalid("class ID space exhausted"))?;
                self.infos.insert(id, key);
                entry.insert(id);
                tracing::debug!(class_id = id, len = class_info.len(), "interned class info");
                Ok(id)
            }
        }
    }

    /// Return the descriptor bytes for `class_id`, or `None` if unknown.
    pub fn class_info(&self, class_id: i32) -> Result<Option<Vec<u8>>> {
        if class_id <= 0 {
            return Err(DirectoryError::invalid(format!(
                "class ID must be greater than 0, got {class_id}"
            )));
        }
        Ok(self.infos.get(&class_id).map(|info| info.to_vec()))
    }

    /// Number of interned descriptors.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl Default for ClassInfoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

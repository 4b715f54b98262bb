//! Object ID allocation.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{DirectoryError, Result};

/// Hands out contiguous, never-overlapping blocks of object IDs.
///
/// A single counter advanced with a checked fetch-and-add; retired IDs are
/// never reused.
#[derive(Debug)]
pub struct ObjectIdAllocator {
    next: AtomicI64,
}

impl ObjectIdAllocator {
    /// Create an allocator whose first block starts at `first`.
    pub fn new(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Reserve `count` IDs and return the first one.
    ///
    /// The block `[first, first + count)` belongs to the caller alone.
    pub fn allocate(&self, count: i32) -> Result<i64> {
        if count < 1 {
            return Err(DirectoryError::invalid(format!(
                "object ID count must be at least 1, got {count}"
            )));
        }
        let first = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                next.checked_add(i64::from(count))
            })
            .map_err(|_| DirectoryError::invalid("object ID space exhausted"))?;
        tracing::debug!(first, count, "reserved object IDs");
        Ok(first)
    }

    /// The first ID that has not been handed out yet.
    pub fn peek_next(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

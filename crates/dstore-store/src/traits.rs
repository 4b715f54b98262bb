use crate::error::StoreResult;

/// Durable data behind the directory.
///
/// Implementations must be thread-safe. Every call is synchronous from the
/// directory's point of view; the directory only calls into the store when
/// it needs data it does not track itself.
pub trait BackingStore: Send + Sync {
    /// Read an object's data. Returns `Ok(None)` if the object does not exist.
    fn object(&self, oid: i64) -> StoreResult<Option<Vec<u8>>>;

    /// The first object with an ID strictly greater than `after`, with its data.
    ///
    /// Pass `-1` to start from the first object.
    fn next_object(&self, after: i64) -> StoreResult<Option<(i64, Vec<u8>)>>;

    /// Create or replace an object.
    fn put_object(&self, oid: i64, data: Vec<u8>) -> StoreResult<()>;

    /// Remove an object. Returns `true` if it existed.
    fn remove_object(&self, oid: i64) -> StoreResult<bool>;

    /// The object bound to `name`, if any.
    fn binding(&self, name: &str) -> StoreResult<Option<i64>>;

    /// The first bound name strictly after `after`, with its object ID.
    ///
    /// Pass `None` to start from the first bound name.
    fn next_binding(&self, after: Option<&str>) -> StoreResult<Option<(String, i64)>>;

    /// Bind `name` to `oid`, replacing any previous binding.
    fn bind(&self, name: &str, oid: i64) -> StoreResult<()>;

    /// Remove the binding for `name`. Returns `true` if it was bound.
    fn unbind(&self, name: &str) -> StoreResult<bool>;
}

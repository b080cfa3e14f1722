use crate::entry::StoreEntry;
use crate::error::StoreResult;

/// Opaque key/value backend.
///
/// All implementations must satisfy these invariants:
/// - Entries are uninterpreted bytes; the store never inspects values.
/// - `get` for a missing key returns `Ok(None)`, never an error.
/// - `put` overwrites an existing entry under the same key.
/// - All I/O errors are propagated, never silently ignored.
pub trait Store: Send + Sync {
    /// Read an entry by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    /// Returns `Err` on I/O failure.
    fn get(&self, key: &str) -> StoreResult<Option<StoreEntry>>;

    /// Write an entry, overwriting any existing value under its key.
    fn put(&self, entry: StoreEntry) -> StoreResult<()>;
}

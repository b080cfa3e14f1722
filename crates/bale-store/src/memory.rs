use std::collections::HashMap;
use std::sync::RwLock;

use crate::entry::StoreEntry;
use crate::error::StoreResult;
use crate::traits::Store;

/// In-memory, HashMap-based key/value store.
///
/// Intended for tests and embedding. All entries are held in memory behind a
/// `RwLock` for safe concurrent access. Values are cloned on read/write.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }

    /// Remove all entries from the store.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all keys in the store.
    pub fn keys(&self) -> Vec<String> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove a single entry. Returns `true` if the key existed.
    ///
    /// The packer never deletes backend entries; this exists for callers
    /// and tests that need to simulate a backend losing a record.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<StoreEntry>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map
            .get(key)
            .map(|value| StoreEntry::new(key, value.clone())))
    }

    fn put(&self, entry: StoreEntry) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(entry.key, entry.value);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("MemoryStore")
            .field("entry_count", &count)
            .finish()
    }
}

//! Striped lock table keyed by primary bucket index.

use std::sync::Mutex;

/// Fixed set of mutual-exclusion locks, one stripe per primary bucket.
///
/// The packer's own operations are not internally concurrent; callers that
/// write on behalf of an item hold the stripe for that item's primary bucket
/// across the operation, and may hold it longer to compose larger critical
/// sections (see `Packer::item_lock`).
pub struct LockTable {
    locks: Vec<Mutex<()>>,
}

impl LockTable {
    /// Create a table with `count` stripes (at least one).
    pub(crate) fn new(count: usize) -> Self {
        let count = count.max(1);
        Self {
            locks: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if the table has no stripes (never the case for a
    /// table built by the packer).
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock stripe for a numeric primary index.
    ///
    /// Values beyond the stripe count wrap around; non-power-of-two bucket
    /// counts can render indices above the nominal count.
    pub fn stripe(&self, index: u64) -> &Mutex<()> {
        &self.locks[(index % self.locks.len() as u64) as usize]
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("stripes", &self.locks.len())
            .finish()
    }
}

//! Recursive put/get/delete over the bucket tree.
//!
//! Every operation hashes the item id, descends from the primary bucket the
//! digest selects, and follows shard slots until it reaches the embedded
//! leaf for that id. A `Promoted` slot restarts the descent in the shard's
//! own backend record. Inserts that would push a record past the promotion
//! threshold split the receiving shard out first.

use std::sync::Mutex;

use tracing::debug;

use bale_crypto::AddressHasher;
use bale_store::{Store, StoreEntry};

use crate::bucket::{Bucket, Item, ShardSlot};
use crate::codec;
use crate::error::{PackerError, PackerResult};
use crate::index;
use crate::locks::LockTable;

/// Prefix substituted when the configured view prefix is empty.
pub const DEFAULT_VIEW_PREFIX: &str = "bale/buckets/";

const DEFAULT_BUCKET_COUNT: usize = 256;
const DEFAULT_SHARD_COUNT: usize = 32;
const DEFAULT_BUCKET_MAX_SIZE: u64 = 512 * 1024;

/// Configuration for a [`Packer`].
#[derive(Clone, Debug)]
pub struct PackerConfig {
    /// Key prefix under which all packer state lives. Normalized to end in
    /// `/`; replaced by [`DEFAULT_VIEW_PREFIX`] when empty.
    pub view_prefix: String,
    /// Number of primary buckets at the root level.
    pub bucket_count: usize,
    /// Fan-out per shard level below the primaries.
    pub shard_count: usize,
    /// Soft cap in bytes on a bucket record. Sharding begins when a record
    /// would grow past 90% of it.
    pub bucket_max_size: u64,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            view_prefix: DEFAULT_VIEW_PREFIX.to_string(),
            bucket_count: DEFAULT_BUCKET_COUNT,
            shard_count: DEFAULT_SHARD_COUNT,
            bucket_max_size: DEFAULT_BUCKET_MAX_SIZE,
        }
    }
}

impl PackerConfig {
    /// Replace zero values with defaults and normalize the prefix.
    fn normalized(mut self) -> Self {
        if self.view_prefix.is_empty() {
            self.view_prefix = DEFAULT_VIEW_PREFIX.to_string();
        }
        if !self.view_prefix.ends_with('/') {
            self.view_prefix.push('/');
        }
        if self.bucket_count == 0 {
            self.bucket_count = DEFAULT_BUCKET_COUNT;
        }
        if self.shard_count == 0 {
            self.shard_count = DEFAULT_SHARD_COUNT;
        }
        if self.bucket_max_size == 0 {
            self.bucket_max_size = DEFAULT_BUCKET_MAX_SIZE;
        }
        self
    }
}

/// Packs many items into a bounded set of backend entries.
///
/// Items are addressed by hashing their id: the digest selects one of
/// `bucket_count` primary buckets, then one shard per level below it. A
/// bucket record that approaches the configured size cap splits the
/// receiving shard out into its own backend entry, so the entry count stays
/// low while total size grows without bound. Buckets never merge back.
pub struct Packer<S: Store> {
    config: PackerConfig,
    store: S,
    hasher: AddressHasher,
    locks: LockTable,
}

impl<S: Store> Packer<S> {
    /// Create a packer over a backend store.
    pub fn new(store: S, config: PackerConfig) -> Self {
        let config = config.normalized();
        let locks = LockTable::new(config.bucket_count);
        Self {
            config,
            store,
            hasher: AddressHasher::ITEM,
            locks,
        }
    }

    /// The normalized configuration in effect.
    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    /// The underlying backend store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The striped lock table, for callers composing critical sections.
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Promotion threshold in bytes: `ceil(0.9 * bucket_max_size)`.
    ///
    /// The 10% headroom absorbs wrapper framing and backend per-entry
    /// overhead, so records never land exactly on the backend's limit.
    pub fn promotion_threshold(&self) -> u64 {
        ((self.config.bucket_max_size as f64) * 90.0 / 100.0).ceil() as u64
    }

    /// Backend key of the primary bucket that addresses `id`.
    pub fn primary_key(&self, id: &str) -> PackerResult<String> {
        if id.is_empty() {
            return Err(PackerError::InvalidArgument("empty item id".into()));
        }
        let digest = self.hasher.digest(id);
        self.primary_key_for(&digest)
    }

    /// Lock stripe guarding the primary bucket that addresses `id`.
    ///
    /// Callers performing a write on behalf of an item hold this lock
    /// across the `put_item`/`delete_item` call; the packer itself does not
    /// lock internally.
    pub fn item_lock(&self, id: &str) -> PackerResult<&Mutex<()>> {
        if id.is_empty() {
            return Err(PackerError::InvalidArgument("empty item id".into()));
        }
        let digest = self.hasher.digest(id);
        let value = index::primary_index_value(&digest, self.config.bucket_count)?;
        Ok(self.locks.stripe(value))
    }

    fn primary_key_for(&self, digest: &[u8; 32]) -> PackerResult<String> {
        let primary_index = index::primary_index(digest, self.config.bucket_count)?;
        Ok(format!("{}{}", self.config.view_prefix, primary_index))
    }

    // -----------------------------------------------------------------------
    // Store gateway
    // -----------------------------------------------------------------------

    /// Read a bucket record from the backend.
    ///
    /// Returns `Ok(None)` when the backend has no entry under `key`. The
    /// decoded bucket's `size` reflects the persisted record length.
    pub fn get_bucket(&self, key: &str) -> PackerResult<Option<Bucket>> {
        if key.is_empty() {
            return Err(PackerError::InvalidArgument("missing bucket key".into()));
        }
        let Some(entry) = self.store.get(key)? else {
            return Ok(None);
        };
        Ok(Some(codec::decode_bucket(&entry.value)?))
    }

    /// Write a bucket record to the backend.
    ///
    /// The bucket's key must live under the configured view prefix.
    pub fn put_bucket(&self, bucket: &Bucket) -> PackerResult<()> {
        if bucket.key.is_empty() {
            return Err(PackerError::InvalidArgument("missing bucket key".into()));
        }
        if !bucket.key.starts_with(&self.config.view_prefix) {
            return Err(PackerError::InvalidArgument(format!(
                "bucket key {:?} lacks the {:?} prefix",
                bucket.key, self.config.view_prefix
            )));
        }
        let value = codec::encode_bucket(bucket)?;
        self.store.put(StoreEntry::new(bucket.key.clone(), value))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Item operations
    // -----------------------------------------------------------------------

    /// Store or overwrite an item.
    ///
    /// Returns the backend key of the leaf shard that now holds the item.
    pub fn put_item(&self, item: &Item) -> PackerResult<String> {
        if item.id.is_empty() {
            return Err(PackerError::InvalidArgument("missing id in item".into()));
        }
        let digest = self.hasher.digest(&item.id);
        let primary_key = self.primary_key_for(&digest)?;
        let mut bucket = match self.get_bucket(&primary_key)? {
            Some(bucket) => bucket,
            None => Bucket::new(primary_key, 0),
        };
        self.put_into_bucket(&mut bucket, item, &digest)
    }

    /// Fetch an item by id. Returns `Ok(None)` when it is not stored.
    pub fn get_item(&self, id: &str) -> PackerResult<Option<Item>> {
        if id.is_empty() {
            return Err(PackerError::InvalidArgument("empty item id".into()));
        }
        let digest = self.hasher.digest(id);
        let primary_key = self.primary_key_for(&digest)?;
        match self.get_bucket(&primary_key)? {
            Some(bucket) => self.get_from_bucket(bucket, id, &digest),
            None => Ok(None),
        }
    }

    /// Remove an item by id. Removing an absent item is a no-op.
    pub fn delete_item(&self, id: &str) -> PackerResult<()> {
        if id.is_empty() {
            return Err(PackerError::InvalidArgument("empty item id".into()));
        }
        let digest = self.hasher.digest(id);
        let primary_key = self.primary_key_for(&digest)?;
        let Some(bucket) = self.get_bucket(&primary_key)? else {
            return Ok(());
        };
        match self.delete_from_bucket(bucket, id, &digest)? {
            Some(root) => self.put_bucket(&root),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Recursive descent
    // -----------------------------------------------------------------------

    /// Insert `item` under `bucket`, splitting the receiving shard out into
    /// its own record when the insert would push this record past the
    /// promotion threshold. Returns the key of the leaf shard that holds
    /// the item.
    fn put_into_bucket(
        &self,
        bucket: &mut Bucket,
        item: &Item,
        digest: &[u8; 32],
    ) -> PackerResult<String> {
        let shard_index = index::shard_index(
            digest,
            bucket.depth,
            self.config.bucket_count,
            self.config.shard_count,
        )?;
        let shard_key = bucket.child_key(&shard_index);

        let mut shard = match bucket.children.remove(&shard_index) {
            // Already split out: continue the insert in the shard's own
            // record, leaving the pointer in place.
            Some(ShardSlot::Promoted { key }) => {
                bucket
                    .children
                    .insert(shard_index, ShardSlot::Promoted { key: key.clone() });
                let mut external = self
                    .get_bucket(&key)?
                    .ok_or(PackerError::MissingPromotedShard { key })?;
                return self.put_into_bucket(&mut external, item, digest);
            }
            Some(ShardSlot::Embedded(shard)) => shard,
            None => Bucket::new(shard_key.clone(), bucket.depth + 1),
        };

        shard.items.insert(item.id.clone(), item.clone());

        if !self.exceeds_size_cap(bucket, item)? {
            bucket
                .children
                .insert(shard_index, ShardSlot::Embedded(shard));
            self.put_bucket(bucket)?;
            return Ok(shard_key);
        }

        // The record would outgrow the cap: the shard splits out into its
        // own entry and the parent keeps only the pointer. The shard's
        // items move one level down, then the insert continues inside the
        // split-out record, which may split again.
        debug!(key = %shard_key, depth = shard.depth, "promoting bucket shard");
        bucket.children.insert(
            shard_index,
            ShardSlot::Promoted {
                key: shard_key.clone(),
            },
        );
        shard.split_items(
            &self.hasher,
            self.config.bucket_count,
            self.config.shard_count,
        )?;
        let leaf_key = self.put_into_bucket(&mut shard, item, digest)?;
        self.put_bucket(bucket)?;
        Ok(leaf_key)
    }

    /// Walk from `bucket` to the embedded leaf for `id`.
    fn get_from_bucket(
        &self,
        bucket: Bucket,
        id: &str,
        digest: &[u8; 32],
    ) -> PackerResult<Option<Item>> {
        let shard_index = index::shard_index(
            digest,
            bucket.depth,
            self.config.bucket_count,
            self.config.shard_count,
        )?;
        match bucket.children.get(&shard_index) {
            None => Ok(None),
            Some(ShardSlot::Promoted { key }) => {
                let external = self
                    .get_bucket(key)?
                    .ok_or_else(|| PackerError::MissingPromotedShard { key: key.clone() })?;
                self.get_from_bucket(external, id, digest)
            }
            Some(ShardSlot::Embedded(shard)) => Ok(shard.items.get(id).cloned()),
        }
    }

    /// Walk to the embedded leaf for `id` and remove it. Returns the root
    /// of the last loaded record, which the caller rewrites; `None` when
    /// the path dead-ends before a leaf.
    fn delete_from_bucket(
        &self,
        mut bucket: Bucket,
        id: &str,
        digest: &[u8; 32],
    ) -> PackerResult<Option<Bucket>> {
        let shard_index = index::shard_index(
            digest,
            bucket.depth,
            self.config.bucket_count,
            self.config.shard_count,
        )?;
        match bucket.children.get_mut(&shard_index) {
            None => Ok(None),
            Some(ShardSlot::Promoted { key }) => {
                let key = key.clone();
                let external = self
                    .get_bucket(&key)?
                    .ok_or(PackerError::MissingPromotedShard { key })?;
                self.delete_from_bucket(external, id, digest)
            }
            Some(ShardSlot::Embedded(shard)) => {
                shard.items.remove(id);
                Ok(Some(bucket))
            }
        }
    }

    /// Whether adding `item` would push this record past the promotion
    /// threshold. Checked against the persisted size from the last read
    /// plus the item's encoded length; the record is never re-encoded.
    fn exceeds_size_cap(&self, bucket: &Bucket, item: &Item) -> PackerResult<bool> {
        let item_len = codec::encoded_item_len(item)?;
        Ok(bucket.size + item_len > self.promotion_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_store::MemoryStore;

    fn packer() -> Packer<MemoryStore> {
        Packer::new(
            MemoryStore::new(),
            PackerConfig {
                view_prefix: "pack/".into(),
                bucket_count: 256,
                shard_count: 32,
                bucket_max_size: 4096,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn zero_config_values_fall_back_to_defaults() {
        let packer = Packer::new(
            MemoryStore::new(),
            PackerConfig {
                view_prefix: String::new(),
                bucket_count: 0,
                shard_count: 0,
                bucket_max_size: 0,
            },
        );
        let config = packer.config();
        assert_eq!(config.view_prefix, DEFAULT_VIEW_PREFIX);
        assert_eq!(config.bucket_count, 256);
        assert_eq!(config.shard_count, 32);
        assert_eq!(config.bucket_max_size, 512 * 1024);
    }

    #[test]
    fn prefix_is_normalized_to_trailing_slash() {
        let packer = Packer::new(
            MemoryStore::new(),
            PackerConfig {
                view_prefix: "custom".into(),
                ..PackerConfig::default()
            },
        );
        assert_eq!(packer.config().view_prefix, "custom/");
    }

    #[test]
    fn threshold_is_ceil_of_ninety_percent() {
        let packer = Packer::new(
            MemoryStore::new(),
            PackerConfig {
                bucket_max_size: 1024,
                ..PackerConfig::default()
            },
        );
        assert_eq!(packer.promotion_threshold(), 922);
    }

    // -----------------------------------------------------------------------
    // Addressing
    // -----------------------------------------------------------------------

    #[test]
    fn primary_key_joins_prefix_and_index() {
        let packer = packer();
        let digest = AddressHasher::ITEM.digest("alice");
        let key = packer.primary_key("alice").unwrap();
        assert_eq!(key, format!("pack/{:02x}", digest[0]));
    }

    #[test]
    fn primary_key_rejects_empty_id() {
        let err = packer().primary_key("").unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn item_lock_is_stable_per_id() {
        let packer = packer();
        let a = packer.item_lock("alice").unwrap();
        let b = packer.item_lock("alice").unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn lock_table_has_one_stripe_per_primary() {
        assert_eq!(packer().locks().len(), 256);
    }

    // -----------------------------------------------------------------------
    // Gateway validation
    // -----------------------------------------------------------------------

    #[test]
    fn get_bucket_rejects_empty_key() {
        let err = packer().get_bucket("").unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn put_bucket_rejects_empty_key() {
        let err = packer().put_bucket(&Bucket::new("", 0)).unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn put_bucket_rejects_foreign_prefix() {
        let err = packer().put_bucket(&Bucket::new("other/00", 0)).unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn bucket_roundtrip_through_gateway() {
        let packer = packer();
        let mut bucket = Bucket::new("pack/7f", 0);
        bucket.children.insert(
            "01".into(),
            ShardSlot::Embedded(Bucket::new("pack/7f/01", 1)),
        );
        packer.put_bucket(&bucket).unwrap();

        let loaded = packer.get_bucket("pack/7f").unwrap().unwrap();
        assert_eq!(loaded.key, "pack/7f");
        assert_eq!(loaded.children, bucket.children);
        assert!(loaded.size > 0);
    }

    #[test]
    fn get_bucket_absent_is_none() {
        assert!(packer().get_bucket("pack/ff").unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Put / Get / Delete basics
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_roundtrip() {
        let packer = packer();
        let item = Item::new("alice", b"payload".to_vec()).with_meta("kind", "entity");
        packer.put_item(&item).unwrap();

        let fetched = packer.get_item("alice").unwrap().unwrap();
        assert_eq!(fetched, item);
    }

    #[test]
    fn returned_key_names_the_leaf_shard() {
        let packer = packer();
        let leaf_key = packer.put_item(&Item::new("alice", vec![1])).unwrap();
        let primary_key = packer.primary_key("alice").unwrap();

        let digest = AddressHasher::ITEM.digest("alice");
        let shard_index = crate::index::shard_index(&digest, 0, 256, 32).unwrap();
        assert_eq!(leaf_key, format!("{primary_key}/{shard_index}"));
    }

    #[test]
    fn get_missing_returns_none() {
        assert!(packer().get_item("ghost").unwrap().is_none());
    }

    #[test]
    fn put_rejects_empty_id() {
        let err = packer().put_item(&Item::new("", vec![])).unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn get_rejects_empty_id() {
        let err = packer().get_item("").unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn delete_rejects_empty_id() {
        let err = packer().delete_item("").unwrap_err();
        assert!(matches!(err, PackerError::InvalidArgument(_)));
    }

    #[test]
    fn delete_removes_item() {
        let packer = packer();
        packer.put_item(&Item::new("alice", vec![1])).unwrap();
        packer.delete_item("alice").unwrap();
        assert!(packer.get_item("alice").unwrap().is_none());
    }

    #[test]
    fn delete_missing_without_primary_writes_nothing() {
        let packer = packer();
        packer.delete_item("ghost").unwrap();
        assert_eq!(packer.store().len(), 0);
    }

    #[test]
    fn delete_missing_leaves_primary_bytes_unchanged() {
        let packer = packer();
        packer.put_item(&Item::new("alice", vec![1])).unwrap();
        let primary_key = packer.primary_key("alice").unwrap();

        // An absent id addressing the same primary must leave the record
        // byte-identical, whether its slot is missing or merely empty.
        let sibling = (0..20_000)
            .map(|i| format!("sibling-{i}"))
            .find(|id| packer.primary_key(id).unwrap() == primary_key)
            .expect("an id sharing alice's primary bucket");

        let before = packer.store().get(&primary_key).unwrap().unwrap().value;
        packer.delete_item(&sibling).unwrap();
        let after = packer.store().get(&primary_key).unwrap().unwrap().value;
        assert_eq!(before, after);
        assert_eq!(packer.store().len(), 1);
    }

    #[test]
    fn overwrite_keeps_one_occurrence() {
        let packer = packer();
        let key1 = packer.put_item(&Item::new("k", b"v1".to_vec())).unwrap();
        let key2 = packer.put_item(&Item::new("k", b"v2".to_vec())).unwrap();
        assert_eq!(key1, key2);

        let fetched = packer.get_item("k").unwrap().unwrap();
        assert_eq!(fetched.data, b"v2");
    }
}

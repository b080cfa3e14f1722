//! Bucket tree records.
//!
//! A bucket is a node of the packing tree. Primary buckets sit directly
//! under the view prefix; every level below is a shard named by a hex index
//! carved out of the item digest. A shard either lives embedded inside its
//! parent's serialized record or, once split out, as its own backend entry,
//! in which case the parent keeps only the pointer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bale_crypto::AddressHasher;

use crate::error::{PackerError, PackerResult};
use crate::index;

/// An individually addressable record packed into a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier; the only input to addressing.
    pub id: String,
    /// Opaque payload bytes.
    pub data: Vec<u8>,
    /// Arbitrary caller-defined fields carried alongside the payload.
    pub meta: BTreeMap<String, String>,
}

impl Item {
    /// Create an item from an id and payload.
    pub fn new(id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            data,
            meta: BTreeMap::new(),
        }
    }

    /// Attach a caller-defined field.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A child position within a bucket.
///
/// A shard starts out embedded in its parent's record and is split out into
/// its own backend entry when the parent record approaches the size cap.
/// The split is one-way: a promoted slot never becomes embedded again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardSlot {
    /// Shard lives inside the parent's serialized record.
    Embedded(Bucket),
    /// Shard has its own backend entry; only the key remains here.
    Promoted { key: String },
}

impl ShardSlot {
    /// Returns `true` if the shard has been split out into its own entry.
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted { .. })
    }

    /// The embedded bucket, if the shard has not been split out.
    pub fn as_embedded(&self) -> Option<&Bucket> {
        match self {
            Self::Embedded(bucket) => Some(bucket),
            Self::Promoted { .. } => None,
        }
    }

    /// Backend key of the shard, wherever it lives.
    pub fn key(&self) -> &str {
        match self {
            Self::Embedded(bucket) => &bucket.key,
            Self::Promoted { key } => key,
        }
    }
}

/// A node of the bucket tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Absolute backend key. For a primary bucket this is the view prefix
    /// plus the primary index; each shard level appends `/` and its index.
    pub key: String,
    /// Shard hops from the primary bucket (the primary itself is 0).
    pub depth: u32,
    /// Items held directly. Populated only in embedded leaf positions.
    pub items: BTreeMap<String, Item>,
    /// Child shards by hex shard index.
    pub children: BTreeMap<String, ShardSlot>,
    /// Serialized length of this bucket's backend record as of the last
    /// read. Maintained by the store gateway from the wrapper record;
    /// never serialized itself and meaningless for embedded shards.
    #[serde(skip)]
    pub size: u64,
}

impl Bucket {
    /// Create a fresh, empty bucket.
    pub fn new(key: impl Into<String>, depth: u32) -> Self {
        Self {
            key: key.into(),
            depth,
            items: BTreeMap::new(),
            children: BTreeMap::new(),
            size: 0,
        }
    }

    /// Backend key of the child shard at `shard_index`.
    pub fn child_key(&self, shard_index: &str) -> String {
        format!("{}/{}", self.key, shard_index)
    }

    /// Total items held directly by this bucket and its embedded children.
    pub fn item_count(&self) -> usize {
        self.items.len()
            + self
                .children
                .values()
                .filter_map(ShardSlot::as_embedded)
                .map(Bucket::item_count)
                .sum::<usize>()
    }

    /// Redistribute direct items into embedded children one shard level
    /// down, selected by each item's digest at this bucket's depth.
    ///
    /// Called on a freshly split-out shard, whose children map is empty; a
    /// promoted slot in the way means the record was tampered with.
    pub(crate) fn split_items(
        &mut self,
        hasher: &AddressHasher,
        bucket_count: usize,
        shard_count: usize,
    ) -> PackerResult<()> {
        let items = std::mem::take(&mut self.items);
        for (id, item) in items {
            let digest = hasher.digest(&id);
            let shard_index = index::shard_index(&digest, self.depth, bucket_count, shard_count)?;
            let child_key = self.child_key(&shard_index);
            let slot = self
                .children
                .entry(shard_index)
                .or_insert_with(|| ShardSlot::Embedded(Bucket::new(child_key, self.depth + 1)));
            match slot {
                ShardSlot::Embedded(child) => {
                    child.items.insert(id, item);
                }
                ShardSlot::Promoted { key } => {
                    return Err(PackerError::Codec(format!(
                        "promoted shard {key} inside a splitting bucket"
                    )));
                }
            }
        }
        Ok(())
    }
}

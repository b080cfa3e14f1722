//! Sharded storage packer for the bale workspace.
//!
//! Multiplexes a very large population of small, individually addressable
//! items onto a much smaller number of entries in an opaque key/value
//! backend. Item ids hash onto a fixed set of primary buckets; each bucket
//! serializes many items into one backend entry and splits shards out into
//! entries of their own as the record approaches the backend's size limit.
//! Entry count stays low while total size grows without bound.
//!
//! # Architecture
//!
//! - **Index** -- carves primary and per-depth shard indices out of the item
//!   digest's bit ranges
//! - **Bucket** -- tree node: direct items, child shards (embedded or
//!   promoted), depth, key
//! - **Codec** -- bincode bucket record inside a wrapper that carries the
//!   record's byte length
//! - **Packer** -- recursive put/get/delete with size-driven shard
//!   promotion; the only component that touches the backend
//! - **LockTable** -- striped per-primary locks, exposed so callers can
//!   compose critical sections
//!
//! Shard promotion is one-way: buckets never merge back, and deleting every
//! item from a promoted shard does not demote it.

pub mod bucket;
pub mod codec;
pub mod error;
mod index;
pub mod locks;
pub mod packer;

pub use bucket::{Bucket, Item, ShardSlot};
pub use codec::BucketWrapper;
pub use error::{PackerError, PackerResult};
pub use locks::LockTable;
pub use packer::{Packer, PackerConfig, DEFAULT_VIEW_PREFIX};

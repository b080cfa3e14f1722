//! Serialized forms of buckets and the wrapper record the backend stores.
//!
//! Two nested records: the bucket record (the tree node itself) and the
//! wrapper that the backend actually stores. The wrapper carries the encoded
//! bucket alongside its byte length so a read can report the stored size
//! without re-encoding anything; the size check on insert runs against the
//! persisted baseline plus the candidate item's encoded length.

use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, Item};
use crate::error::{PackerError, PackerResult};

/// Outer record persisted for every bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketWrapper {
    /// Encoded bucket record.
    pub data: Vec<u8>,
    /// Length of `data` at encode time.
    pub size: u64,
}

/// Encode a bucket into the wrapper form stored by the backend.
pub fn encode_bucket(bucket: &Bucket) -> PackerResult<Vec<u8>> {
    let data = bincode::serialize(bucket).map_err(|e| PackerError::Codec(e.to_string()))?;
    let wrapper = BucketWrapper {
        size: data.len() as u64,
        data,
    };
    bincode::serialize(&wrapper).map_err(|e| PackerError::Codec(e.to_string()))
}

/// Decode a wrapper into a bucket, populating the bucket's in-memory `size`
/// from the wrapper.
pub fn decode_bucket(bytes: &[u8]) -> PackerResult<Bucket> {
    let wrapper: BucketWrapper =
        bincode::deserialize(bytes).map_err(|e| PackerError::Codec(e.to_string()))?;
    let mut bucket: Bucket =
        bincode::deserialize(&wrapper.data).map_err(|e| PackerError::Codec(e.to_string()))?;
    bucket.size = wrapper.size;
    Ok(bucket)
}

/// Encoded length of a single item, as used by the size check.
pub fn encoded_item_len(item: &Item) -> PackerResult<u64> {
    bincode::serialized_size(item).map_err(|e| PackerError::Codec(e.to_string()))
}

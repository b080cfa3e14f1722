use thiserror::Error;

use bale_store::StoreError;

/// Errors from packer operations.
#[derive(Debug, Error)]
pub enum PackerError {
    /// A caller-supplied argument was rejected (empty id, missing key,
    /// key outside the configured prefix).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Encoding or decoding of a bucket or wrapper record failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The item digest has no bits left for a shard index at this depth.
    #[error("item digest exhausted at depth {depth}")]
    DigestExhausted { depth: u32 },

    /// Backend get/put failed; the cause is preserved.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A parent record points at a promoted shard whose own record is
    /// missing from the backend.
    #[error("promoted shard record missing: {key}")]
    MissingPromotedShard { key: String },
}

/// Result alias for packer operations.
pub type PackerResult<T> = Result<T, PackerError>;

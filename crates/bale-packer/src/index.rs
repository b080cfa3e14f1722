//! Bucket index derivation from item digests.
//!
//! Every bucket position an item can occupy is named by a bit range of the
//! 256-bit digest of its id: the first `bits_needed(bucket_count)` bits name
//! the primary bucket, and each shard level below consumes the next
//! `bits_needed(shard_count)` bits. Indices are rendered as fixed-width
//! lowercase hex and treated as opaque map keys from there on; they are
//! never reduced modulo the configured count, so non-power-of-two counts can
//! render values above the nominal count.

use crate::error::{PackerError, PackerResult};

/// Minimum number of bits required to enumerate the natural numbers below
/// `n`.
pub(crate) fn bits_needed(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Hex digits used to render an index of `bits` bits.
///
/// Clamped to one digit so a zero-bit index renders as `"0"` instead of an
/// empty key segment.
fn hex_width(bits: u32) -> usize {
    ((bits + 3) / 4).max(1) as usize
}

/// Big-endian value of `count` bits of `digest` starting at bit `offset`.
///
/// Returns `None` when the range runs past the end of the digest.
fn bit_range_value(digest: &[u8], offset: u64, count: u32) -> Option<u64> {
    if count > 64 || offset + count as u64 > (digest.len() as u64) * 8 {
        return None;
    }
    let mut value = 0u64;
    for bit in offset..offset + count as u64 {
        let byte = digest[(bit / 8) as usize];
        let shift = 7 - (bit % 8) as u32;
        value = (value << 1) | ((byte >> shift) & 1) as u64;
    }
    Some(value)
}

fn render_hex(value: u64, bits: u32) -> String {
    format!("{value:0width$x}", width = hex_width(bits))
}

/// Numeric primary bucket index for a digest (used for lock striping).
pub(crate) fn primary_index_value(digest: &[u8; 32], bucket_count: usize) -> PackerResult<u64> {
    let bits = bits_needed(bucket_count);
    bit_range_value(digest, 0, bits).ok_or(PackerError::DigestExhausted { depth: 0 })
}

/// Hex index of the primary bucket that addresses a digest.
pub(crate) fn primary_index(digest: &[u8; 32], bucket_count: usize) -> PackerResult<String> {
    let bits = bits_needed(bucket_count);
    let value = primary_index_value(digest, bucket_count)?;
    Ok(render_hex(value, bits))
}

/// Hex index of the shard a digest selects at the given depth.
///
/// Depth `d` skips the primary bits plus `d` shard levels before taking the
/// next `bits_needed(shard_count)` bits.
pub(crate) fn shard_index(
    digest: &[u8; 32],
    depth: u32,
    bucket_count: usize,
    shard_count: usize,
) -> PackerResult<String> {
    let shard_bits = bits_needed(shard_count);
    let skip = bits_needed(bucket_count) as u64 + depth as u64 * shard_bits as u64;
    let value =
        bit_range_value(digest, skip, shard_bits).ok_or(PackerError::DigestExhausted { depth })?;
    Ok(render_hex(value, shard_bits))
}

//! Hashing primitive for the bale storage packer.
//!
//! Item addressing rests on a single 256-bit digest of the item identifier;
//! every bucket index is carved out of bit ranges of that digest. This crate
//! provides the digest behind a domain-separated wrapper so that addressing
//! hashes can never collide with hashes computed for other purposes.
//!
//! All hashing goes through BLAKE3; there is no custom cryptography.

pub mod hasher;

pub use hasher::AddressHasher;

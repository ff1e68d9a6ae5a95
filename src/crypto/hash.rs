//! BLAKE2b hashing utilities
//!
//! Key hashes and script hashes are 28-byte BLAKE2b digests; transaction
//! bodies and metadata anchors use the 32-byte variant.

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};

/// Length in bytes of key hashes, script hashes and policy ids
pub const HASH28_LEN: usize = 28;

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// Computes BLAKE2b-224 of the input data
pub fn blake2b_224(data: &[u8]) -> [u8; HASH28_LEN] {
    let mut hasher = Blake2b224::new();
    hasher.update(data);
    let mut out = [0u8; HASH28_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Computes BLAKE2b-256 of the input data
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Computes BLAKE2b-224 and returns it as a hex string
pub fn blake2b_224_hex(data: &[u8]) -> String {
    hex::encode(blake2b_224(data))
}

/// Computes BLAKE2b-256 and returns it as a hex string
pub fn blake2b_256_hex(data: &[u8]) -> String {
    hex::encode(blake2b_256(data))
}

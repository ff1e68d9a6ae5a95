//! Cryptographic utilities
//!
//! This module provides the BLAKE2b digests the ledger uses for
//! key hashes, script hashes and transaction ids.

pub mod hash;

pub use hash::{blake2b_224, blake2b_224_hex, blake2b_256, blake2b_256_hex, HASH28_LEN};

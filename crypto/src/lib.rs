//! Cryptographic primitives for the Keel node.
//!
//! Only hashing lives here: canonical block and transaction identifiers are
//! Blake2b-256 digests of their canonical serialisations.

pub mod hash;

pub use hash::{blake2b_256, blake2b_256_multi, hash_block, hash_transaction};

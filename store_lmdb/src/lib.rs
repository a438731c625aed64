//! LMDB storage backend for the Keel node.
//!
//! Implements the `keel-store` backend traits using the `heed` LMDB
//! bindings. Each named table maps to one LMDB database within a single
//! environment; a write transaction spans every table and commits with a
//! single fsync.

pub mod environment;
pub mod error;
pub mod transaction;

pub use environment::LmdbStore;
pub use error::LmdbError;

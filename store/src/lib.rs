//! Abstract storage backend for the Keel node.
//!
//! Every storage backend (LMDB, in-memory for testing) implements the traits
//! in [`kv`]. The rest of the workspace depends only on the traits: an
//! ordered key-value store with named tables, multi-table write
//! transactions, forward scans, and point deletes.

pub mod error;
pub mod kv;
pub mod memory;

pub use error::StoreError;
pub use kv::{KvIter, KvStore, ReadTxn, Row, WriteTxn};
pub use memory::MemoryStore;

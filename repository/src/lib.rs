//! Block repository — the durable, transactional storage layer of the Keel
//! node.
//!
//! Persists raw block payloads keyed by block hash, optionally maintains a
//! secondary transaction-hash index, and tracks the chain tip as an atomic
//! unit of progress. All multi-table mutations commit atomically through the
//! abstract `keel-store` backend; genesis data is served from an in-memory
//! map and never persisted.

pub mod block;
pub mod cancel;
pub mod error;
pub mod genesis;
pub mod hooks;
pub mod repository;
pub mod schema;
pub mod validation;

pub use block::{Block, BlockHeader, Transaction};
pub use cancel::CancellationToken;
pub use error::RepositoryError;
pub use genesis::Network;
pub use hooks::RepositoryHooks;
pub use repository::BlockRepository;
pub use validation::{BlockValidator, ValidationError, ValidatorChain};

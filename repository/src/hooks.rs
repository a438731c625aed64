//! Capability hooks for augmented stores.
//!
//! A store built on top of the repository (a coin-view index, a spend
//! journal) plugs in here instead of subclassing: each hook receives the
//! open write transaction together with the affected entities and may write
//! its own tables. A hook error aborts the whole transaction, so augmented
//! tables stay atomic with the repository's own.

use keel_store::{StoreError, WriteTxn};
use keel_types::{BlockHash, TxHash};

use crate::block::Block;

/// Invoked with the blocks newly inserted by `put_blocks`.
pub type InsertBlocksHook =
    Box<dyn for<'t> Fn(&mut (dyn WriteTxn + 't), &[Block]) -> Result<(), StoreError> + Send + Sync>;

/// Invoked with the `(tx_hash, block_hash)` pairs newly indexed by
/// `put_blocks`. Only fires while tx-indexing is enabled.
pub type InsertTransactionsHook = Box<
    dyn for<'t> Fn(&mut (dyn WriteTxn + 't), &[(TxHash, BlockHash)]) -> Result<(), StoreError>
        + Send
        + Sync,
>;

/// Invoked with the blocks removed by `delete` / `delete_blocks`.
pub type DeleteBlocksHook =
    Box<dyn for<'t> Fn(&mut (dyn WriteTxn + 't), &[Block]) -> Result<(), StoreError> + Send + Sync>;

/// Invoked with the index pairs removed by `delete` / `delete_blocks`.
/// Only fires while tx-indexing is enabled.
pub type DeleteTransactionsHook = Box<
    dyn for<'t> Fn(&mut (dyn WriteTxn + 't), &[(TxHash, BlockHash)]) -> Result<(), StoreError>
        + Send
        + Sync,
>;

/// The four configuration points. All default to disabled.
#[derive(Default)]
pub struct RepositoryHooks {
    pub on_insert_blocks: Option<InsertBlocksHook>,
    pub on_insert_transactions: Option<InsertTransactionsHook>,
    pub on_delete_blocks: Option<DeleteBlocksHook>,
    pub on_delete_transactions: Option<DeleteTransactionsHook>,
}

impl RepositoryHooks {
    pub fn none() -> Self {
        Self::default()
    }
}

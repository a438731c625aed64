//! Genesis block creation — the first block on each network.
//!
//! The genesis block has `previous: BlockHash::ZERO` and differs per
//! `NetworkId` (live, test, dev) so that each network has a unique,
//! deterministic genesis hash. Genesis data is never persisted: the
//! repository serves it from memory (the store only ever holds blocks that
//! were ingested after genesis).

use keel_types::{BlockHash, NetworkId, TxHash};
use std::collections::HashMap;

use crate::block::{Block, Transaction};

/// Create the genesis block for a network.
///
/// The block embeds two seed transactions whose payloads encode the network
/// name, so that genesis transaction hashes are deterministic per network.
pub fn create_genesis_block(network: NetworkId) -> Block {
    let transactions = vec![
        Transaction::new(format!("keel-genesis-{}-allocation", network.as_str()).into_bytes()),
        Transaction::new(format!("keel-genesis-{}-params", network.as_str()).into_bytes()),
    ];
    Block::new(BlockHash::ZERO, genesis_timestamp(network), 0, transactions)
}

/// Return the deterministic genesis block hash for a network.
///
/// Useful for hardcoding known genesis hashes for bootstrapping.
pub fn genesis_hash(network: NetworkId) -> BlockHash {
    create_genesis_block(network).compute_hash()
}

/// Genesis timestamp per network.
fn genesis_timestamp(network: NetworkId) -> u64 {
    match network {
        // Live: 2026-01-01 00:00:00 UTC
        NetworkId::Live => 1_767_225_600,
        // Test: 2025-06-01 00:00:00 UTC
        NetworkId::Test => 1_748_736_000,
        // Dev: epoch 0
        NetworkId::Dev => 0,
    }
}

/// A network definition: identifier plus the genesis data the repository
/// serves from memory. Immutable after construction and safely shared
/// across threads.
#[derive(Clone, Debug)]
pub struct Network {
    id: NetworkId,
    genesis_block: Block,
    genesis_hash: BlockHash,
}

impl Network {
    pub fn new(id: NetworkId) -> Self {
        let genesis_block = create_genesis_block(id);
        let genesis_hash = genesis_block.compute_hash();
        Self {
            id,
            genesis_block,
            genesis_hash,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis_block
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_hash
    }

    /// Build the lookup map of genesis transactions by hash.
    pub fn genesis_transactions(&self) -> HashMap<TxHash, Transaction> {
        self.genesis_block
            .transactions
            .iter()
            .map(|tx| (tx.compute_hash(), tx.clone()))
            .collect()
    }
}

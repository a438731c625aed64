//! The block repository: persistence of raw block payloads, the optional
//! transaction index, and the chain tip.
//!
//! Each public operation opens exactly one backend transaction. Writers are
//! serialised by the repository (and by the backend's own write lock);
//! readers run concurrently against snapshots. The tip and tx-index flag
//! are cached in memory and updated in lockstep with their persisted rows,
//! inside the same transaction that mutates the tables.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use keel_store::{KvStore, ReadTxn, WriteTxn};
use keel_types::{BlockHash, ChainTip, TxHash};

use crate::block::{Block, Transaction};
use crate::cancel::CancellationToken;
use crate::error::RepositoryError;
use crate::genesis::Network;
use crate::hooks::RepositoryHooks;
use crate::schema::{
    decode_block, decode_block_hash, decode_flag, decode_tip, encode_block, encode_flag,
    ALL_TABLES, BLOCK_TABLE, COMMON_TABLE, TIP_KEY, TX_INDEX_FLAG_KEY, TX_INDEX_TABLE,
};

/// How often the reindex scan reports progress, in blocks.
const REINDEX_PROGRESS_INTERVAL: u64 = 1_000;

/// The in-memory mirror of the `Common` table, populated by `initialize`.
#[derive(Clone, Copy)]
struct CachedState {
    tip: ChainTip,
    tx_index: bool,
}

/// Durable block storage over an abstract ordered KV backend.
pub struct BlockRepository {
    store: Arc<dyn KvStore>,
    network: Network,
    genesis_transactions: HashMap<TxHash, Transaction>,
    hooks: RepositoryHooks,
    state: Mutex<Option<CachedState>>,
}

impl BlockRepository {
    /// Create a repository over the given backend. `initialize` must be
    /// called before any other operation.
    pub fn new(store: Arc<dyn KvStore>, network: Network) -> Self {
        Self::with_hooks(store, network, RepositoryHooks::none())
    }

    /// Create a repository with capability hooks for an augmented store.
    pub fn with_hooks(store: Arc<dyn KvStore>, network: Network, hooks: RepositoryHooks) -> Self {
        let genesis_transactions = network.genesis_transactions();
        Self {
            store,
            network,
            genesis_transactions,
            hooks,
            state: Mutex::new(None),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The cached chain tip. `None` until `initialize` has run.
    pub fn tip_hash_and_height(&self) -> Option<ChainTip> {
        (*self.state_guard()).map(|s| s.tip)
    }

    /// The cached tx-index flag. `false` until `initialize` has run.
    pub fn tx_index(&self) -> bool {
        (*self.state_guard()).map(|s| s.tx_index).unwrap_or(false)
    }

    fn state_guard(&self) -> MutexGuard<'_, Option<CachedState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_initialized(&self) -> Result<CachedState, RepositoryError> {
        (*self.state_guard())
            .ok_or(RepositoryError::InvalidArgument("repository is not initialized"))
    }

    /// Idempotent bootstrap. Writes the genesis tip and a disabled tx-index
    /// flag when absent, and loads both into the cache. Commits only if a
    /// row was written.
    pub fn initialize(&self) -> Result<(), RepositoryError> {
        let mut guard = self.state_guard();

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&[COMMON_TABLE])?;
        txn.set_lazy_values(false);

        let mut dirty = false;
        let tip = match txn.select(COMMON_TABLE, TIP_KEY)?.into_value() {
            Some(bytes) => decode_tip(&bytes)?,
            None => {
                let tip = ChainTip::new(self.network.genesis_hash(), 0);
                txn.insert(COMMON_TABLE, TIP_KEY, &tip.to_bytes())?;
                dirty = true;
                tip
            }
        };
        let tx_index = match txn.select(COMMON_TABLE, TX_INDEX_FLAG_KEY)?.into_value() {
            Some(bytes) => decode_flag(&bytes)?,
            None => {
                txn.insert(COMMON_TABLE, TX_INDEX_FLAG_KEY, &encode_flag(false))?;
                dirty = true;
                false
            }
        };
        if dirty {
            txn.commit()?;
        }

        *guard = Some(CachedState { tip, tx_index });
        debug!(tip = %tip, tx_index, "repository initialized");
        Ok(())
    }

    /// Store a contiguous batch of blocks and advance the tip, atomically.
    ///
    /// The batch is de-duplicated by hash (first occurrence wins) and
    /// written in ascending raw-byte key order. Rows already present are
    /// not rewritten. When tx-indexing is enabled, every transaction of
    /// every newly inserted block is indexed, overwriting prior entries for
    /// the same transaction hash.
    pub fn put_blocks(&self, new_tip: ChainTip, blocks: &[Block]) -> Result<(), RepositoryError> {
        let mut guard = self.state_guard();
        let state =
            (*guard).ok_or(RepositoryError::InvalidArgument("repository is not initialized"))?;

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&ALL_TABLES)?;

        let mut seen = HashSet::with_capacity(blocks.len());
        let mut batch: Vec<(BlockHash, &Block)> = Vec::with_capacity(blocks.len());
        for block in blocks {
            let hash = block.compute_hash();
            if seen.insert(hash) {
                batch.push((hash, block));
            }
        }
        batch.sort_by_key(|(hash, _)| *hash);

        let mut inserted: Vec<(BlockHash, &Block)> = Vec::with_capacity(batch.len());
        for (hash, block) in batch {
            // Key-only probe; the row is not rewritten when present.
            if txn.select(BLOCK_TABLE, hash.as_bytes())?.exists() {
                continue;
            }
            let bytes = encode_block(block)?;
            txn.insert(BLOCK_TABLE, hash.as_bytes(), &bytes)?;
            inserted.push((hash, block));
        }

        let mut pairs: Vec<(TxHash, BlockHash)> = Vec::new();
        if state.tx_index {
            for (hash, block) in &inserted {
                for tx in &block.transactions {
                    pairs.push((tx.compute_hash(), *hash));
                }
            }
            pairs.sort_by_key(|(tx_hash, _)| *tx_hash);
            for (tx_hash, block_hash) in &pairs {
                txn.insert(TX_INDEX_TABLE, tx_hash.as_bytes(), block_hash.as_bytes())?;
            }
        }

        if let Some(hook) = &self.hooks.on_insert_blocks {
            let blocks: Vec<Block> = inserted.iter().map(|(_, b)| (*b).clone()).collect();
            hook(txn.as_mut(), &blocks)?;
        }
        if state.tx_index {
            if let Some(hook) = &self.hooks.on_insert_transactions {
                hook(txn.as_mut(), &pairs)?;
            }
        }

        txn.insert(COMMON_TABLE, TIP_KEY, &new_tip.to_bytes())?;
        txn.commit()?;

        *guard = Some(CachedState {
            tip: new_tip,
            tx_index: state.tx_index,
        });
        debug!(
            inserted = inserted.len(),
            indexed = pairs.len(),
            tip = %new_tip,
            "stored block batch"
        );
        Ok(())
    }

    /// Fetch a block by hash. The genesis block is served from memory.
    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>, RepositoryError> {
        Ok(self.get_blocks(std::slice::from_ref(hash))?.pop().flatten())
    }

    /// Fetch a batch of blocks. Lookups are issued in ascending key order
    /// but results come back in input order, `None` per missing hash.
    pub fn get_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Option<Block>>, RepositoryError> {
        self.require_initialized()?;

        let mut results: Vec<Option<Block>> = vec![None; hashes.len()];
        let mut positions: BTreeMap<BlockHash, Vec<usize>> = BTreeMap::new();
        for (i, hash) in hashes.iter().enumerate() {
            if *hash == self.network.genesis_hash() {
                results[i] = Some(self.network.genesis_block().clone());
            } else {
                positions.entry(*hash).or_default().push(i);
            }
        }
        if positions.is_empty() {
            return Ok(results);
        }

        let mut txn = self.store.begin_read()?;
        txn.set_lazy_values(false);
        for (hash, slots) in &positions {
            if let Some(bytes) = txn.select(BLOCK_TABLE, hash.as_bytes())?.into_value() {
                let block = decode_block(&bytes)?;
                for slot in slots {
                    results[*slot] = Some(block.clone());
                }
            }
        }
        Ok(results)
    }

    /// Whether a block row is present. Key-only probe: the genesis block is
    /// NOT special-cased here, so this reports literal row presence even
    /// though `get_block` serves genesis from memory.
    pub fn exists(&self, hash: &BlockHash) -> Result<bool, RepositoryError> {
        self.require_initialized()?;
        let txn = self.store.begin_read()?;
        Ok(txn.select(BLOCK_TABLE, hash.as_bytes())?.exists())
    }

    /// Resolve a transaction by hash via the tx index. Returns `None`
    /// whenever tx-indexing is disabled; genesis transactions are served
    /// from memory.
    pub fn get_transaction_by_id(
        &self,
        txid: &TxHash,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let state = self.require_initialized()?;
        if !state.tx_index {
            return Ok(None);
        }
        if let Some(tx) = self.genesis_transactions.get(txid) {
            return Ok(Some(tx.clone()));
        }
        let mut txn = self.store.begin_read()?;
        txn.set_lazy_values(false);
        self.lookup_transaction(txn.as_ref(), txid)
    }

    /// Batched transaction resolution with an all-or-nothing contract: the
    /// first id that cannot be resolved nulls the whole result. Duplicate
    /// ids are served from the already-resolved slice. The cancellation
    /// token is polled between ids; cancellation is a distinguished error,
    /// not a `None`.
    pub fn get_transactions_by_ids(
        &self,
        txids: &[TxHash],
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<Transaction>>, RepositoryError> {
        let state = self.require_initialized()?;
        if !state.tx_index {
            return Ok(None);
        }

        let mut txn = self.store.begin_read()?;
        txn.set_lazy_values(false);

        let mut resolved: HashMap<TxHash, usize> = HashMap::new();
        let mut out: Vec<Transaction> = Vec::with_capacity(txids.len());
        for txid in txids {
            if cancel.is_cancelled() {
                return Err(RepositoryError::Cancelled);
            }
            if let Some(&idx) = resolved.get(txid) {
                let tx = out[idx].clone();
                out.push(tx);
                continue;
            }
            let tx = match self.genesis_transactions.get(txid) {
                Some(tx) => Some(tx.clone()),
                None => self.lookup_transaction(txn.as_ref(), txid)?,
            };
            match tx {
                Some(tx) => {
                    resolved.insert(*txid, out.len());
                    out.push(tx);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// Resolve the hash of the block containing a transaction. Returns
    /// `None` whenever tx-indexing is disabled; genesis transactions map to
    /// the genesis hash.
    pub fn get_block_id_by_transaction_id(
        &self,
        txid: &TxHash,
    ) -> Result<Option<BlockHash>, RepositoryError> {
        let state = self.require_initialized()?;
        if !state.tx_index {
            return Ok(None);
        }
        if self.genesis_transactions.contains_key(txid) {
            return Ok(Some(self.network.genesis_hash()));
        }
        let mut txn = self.store.begin_read()?;
        txn.set_lazy_values(false);
        match txn.select(TX_INDEX_TABLE, txid.as_bytes())?.into_value() {
            Some(value) => Ok(Some(decode_block_hash(&value)?)),
            None => Ok(None),
        }
    }

    fn lookup_transaction(
        &self,
        txn: &dyn ReadTxn,
        txid: &TxHash,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let Some(value) = txn.select(TX_INDEX_TABLE, txid.as_bytes())?.into_value() else {
            return Ok(None);
        };
        let block_hash = decode_block_hash(&value)?;
        let Some(bytes) = txn.select(BLOCK_TABLE, block_hash.as_bytes())?.into_value() else {
            return Ok(None);
        };
        let block = decode_block(&bytes)?;
        Ok(block
            .transactions
            .into_iter()
            .find(|tx| tx.compute_hash() == *txid))
    }

    /// Remove a batch of blocks (and their index entries) and move the tip,
    /// atomically. Missing hashes are silently skipped.
    pub fn delete(&self, new_tip: ChainTip, hashes: &[BlockHash]) -> Result<(), RepositoryError> {
        let mut guard = self.state_guard();
        let state =
            (*guard).ok_or(RepositoryError::InvalidArgument("repository is not initialized"))?;

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&ALL_TABLES)?;
        let removed = self.remove_blocks(txn.as_mut(), state.tx_index, hashes)?;
        txn.insert(COMMON_TABLE, TIP_KEY, &new_tip.to_bytes())?;
        txn.commit()?;

        *guard = Some(CachedState {
            tip: new_tip,
            tx_index: state.tx_index,
        });
        debug!(removed, tip = %new_tip, "deleted block batch");
        Ok(())
    }

    /// Remove a batch of blocks (and their index entries) without touching
    /// the tip.
    pub fn delete_blocks(&self, hashes: &[BlockHash]) -> Result<(), RepositoryError> {
        let guard = self.state_guard();
        let state =
            (*guard).ok_or(RepositoryError::InvalidArgument("repository is not initialized"))?;

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&[BLOCK_TABLE, TX_INDEX_TABLE])?;
        let removed = self.remove_blocks(txn.as_mut(), state.tx_index, hashes)?;
        txn.commit()?;

        debug!(removed, "deleted block batch, tip untouched");
        Ok(())
    }

    fn remove_blocks(
        &self,
        txn: &mut (dyn WriteTxn + '_),
        tx_index: bool,
        hashes: &[BlockHash],
    ) -> Result<usize, RepositoryError> {
        txn.set_lazy_values(false);

        // Fetch the referenced blocks to enumerate their transactions,
        // skipping hashes with no row. Sorted access, as on the write path.
        let mut sorted: Vec<BlockHash> = hashes.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut found: Vec<(BlockHash, Block)> = Vec::with_capacity(sorted.len());
        for hash in sorted {
            if let Some(bytes) = txn.select(BLOCK_TABLE, hash.as_bytes())?.into_value() {
                found.push((hash, decode_block(&bytes)?));
            }
        }

        if tx_index {
            let mut pairs: Vec<(TxHash, BlockHash)> = Vec::new();
            for (hash, block) in &found {
                for tx in &block.transactions {
                    pairs.push((tx.compute_hash(), *hash));
                }
            }
            pairs.sort_by_key(|(tx_hash, _)| *tx_hash);
            for (tx_hash, _) in &pairs {
                txn.remove_key(TX_INDEX_TABLE, tx_hash.as_bytes())?;
            }
            if let Some(hook) = &self.hooks.on_delete_transactions {
                hook(txn, &pairs)?;
            }
        }

        for (hash, _) in &found {
            txn.remove_key(BLOCK_TABLE, hash.as_bytes())?;
        }
        if let Some(hook) = &self.hooks.on_delete_blocks {
            let blocks: Vec<Block> = found.iter().map(|(_, b)| b.clone()).collect();
            hook(txn, &blocks)?;
        }
        Ok(found.len())
    }

    /// Persist the tx-index flag under its own single-item transaction.
    /// Does not trigger or undo any indexing; pair with `reindex`.
    pub fn set_tx_index(&self, flag: bool) -> Result<(), RepositoryError> {
        let mut guard = self.state_guard();
        let state =
            (*guard).ok_or(RepositoryError::InvalidArgument("repository is not initialized"))?;

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&[COMMON_TABLE])?;
        txn.insert(COMMON_TABLE, TX_INDEX_FLAG_KEY, &encode_flag(flag))?;
        txn.commit()?;

        *guard = Some(CachedState {
            tip: state.tip,
            tx_index: flag,
        });
        Ok(())
    }

    /// Synchronise the tx index with the current flag value over the full
    /// block population, in one transaction.
    ///
    /// Flag enabled: every block row is scanned and every transaction
    /// re-indexed, overwriting prior entries. Flag disabled: the index
    /// table is truncated. A crash mid-reindex leaves the transaction
    /// uncommitted, so the next run sees the pre-state and can retry.
    pub fn reindex(&self) -> Result<(), RepositoryError> {
        let _guard = self.state_guard();
        let tx_index = (*_guard)
            .ok_or(RepositoryError::InvalidArgument("repository is not initialized"))?
            .tx_index;

        let mut txn = self.store.begin_write()?;
        txn.synchronize_tables(&[BLOCK_TABLE, TX_INDEX_TABLE])?;

        if tx_index {
            txn.set_lazy_values(false);
            let total = txn.count(BLOCK_TABLE)?;

            let mut pairs: Vec<(TxHash, BlockHash)> = Vec::new();
            let mut scanned: u64 = 0;
            for entry in txn.select_forward(BLOCK_TABLE)? {
                let (key, value) = entry?;
                let block_hash = decode_block_hash(&key)?;
                let block = decode_block(&value)?;
                for tx in &block.transactions {
                    pairs.push((tx.compute_hash(), block_hash));
                }
                scanned += 1;
                if scanned % REINDEX_PROGRESS_INTERVAL == 0 {
                    info!(scanned, total, "reindex in progress");
                }
            }

            pairs.sort_by_key(|(tx_hash, _)| *tx_hash);
            for (tx_hash, block_hash) in &pairs {
                txn.insert(TX_INDEX_TABLE, tx_hash.as_bytes(), block_hash.as_bytes())?;
            }
            txn.commit()?;
            info!(blocks = scanned, entries = pairs.len(), "reindex complete");
        } else {
            txn.remove_all(TX_INDEX_TABLE)?;
            txn.commit()?;
            info!("transaction index truncated");
        }
        Ok(())
    }
}

//! On-disk schema: table names, meta keys, and row codecs.
//!
//! Table names and meta key encodings are fixed — stores written by other
//! implementations of this layout must remain interchangeable.

use keel_store::StoreError;
use keel_types::{BlockHash, ChainTip};

use crate::block::Block;

/// Raw block payloads keyed by 32-byte block hash.
pub const BLOCK_TABLE: &str = "Block";

/// Secondary index: 32-byte transaction hash → 32-byte containing block hash.
pub const TX_INDEX_TABLE: &str = "Transaction";

/// Repository metadata: tip and tx-index flag.
pub const COMMON_TABLE: &str = "Common";

/// Every table the repository owns, in the order backends are opened with.
pub const ALL_TABLES: [&str; 3] = [BLOCK_TABLE, TX_INDEX_TABLE, COMMON_TABLE];

/// Meta key of the chain tip row.
pub const TIP_KEY: &[u8] = b"";

/// Meta key of the tx-index flag row.
pub const TX_INDEX_FLAG_KEY: &[u8] = &[0x00];

pub(crate) fn encode_flag(flag: bool) -> [u8; 1] {
    [u8::from(flag)]
}

pub(crate) fn decode_flag(bytes: &[u8]) -> Result<bool, StoreError> {
    match bytes {
        [0x00] => Ok(false),
        [0x01] => Ok(true),
        _ => Err(StoreError::Corruption(format!(
            "tx-index flag row has unexpected encoding ({} bytes)",
            bytes.len()
        ))),
    }
}

pub(crate) fn decode_tip(bytes: &[u8]) -> Result<ChainTip, StoreError> {
    ChainTip::from_bytes(bytes).map_err(|e| StoreError::Corruption(e.to_string()))
}

pub(crate) fn decode_block_hash(bytes: &[u8]) -> Result<BlockHash, StoreError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::Corruption(format!("expected 32-byte hash, got {}", bytes.len())))?;
    Ok(BlockHash::new(arr))
}

pub(crate) fn encode_block(block: &Block) -> Result<Vec<u8>, StoreError> {
    block.to_bytes().map_err(|e| StoreError::Corruption(e.to_string()))
}

pub(crate) fn decode_block(bytes: &[u8]) -> Result<Block, StoreError> {
    Block::from_bytes(bytes).map_err(|e| StoreError::Corruption(e.to_string()))
}

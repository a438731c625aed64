//! Block and transaction domain objects with their canonical hashes and
//! storage codec.

use keel_crypto::blake2b_256;
use keel_types::{BlockHash, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current block format version.
pub const CURRENT_BLOCK_VERSION: u32 = 1;

/// Raised when a stored block payload does not encode or decode.
#[derive(Debug, Error)]
#[error("block codec error: {0}")]
pub struct CodecError(String);

/// An operation embedded within a block. The payload is opaque to the
/// storage layer; only the canonical hash matters here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            version: CURRENT_BLOCK_VERSION,
            payload,
        }
    }

    /// Compute the canonical hash of this transaction.
    ///
    /// Serializes the fields in canonical order, then hashes with
    /// Blake2b-256:
    /// 0. version (4 bytes, big-endian)
    /// 1. payload
    pub fn compute_hash(&self) -> TxHash {
        let mut buffer = Vec::with_capacity(4 + self.payload.len());
        buffer.extend_from_slice(&self.version.to_be_bytes());
        buffer.extend_from_slice(&self.payload);
        TxHash::new(blake2b_256(&buffer))
    }
}

/// The fixed-size portion of a block; the canonical block hash is computed
/// over these fields alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block format version (currently 1).
    pub version: u32,

    /// Hash of the previous block in the chain (zero for genesis).
    pub previous: BlockHash,

    /// Digest binding the block to its transaction list.
    pub tx_root: [u8; 32],

    /// Block timestamp (seconds since the Unix epoch).
    pub timestamp: u64,

    /// Arbitrary nonce chosen by the block producer.
    pub nonce: u64,
}

/// A full block: header plus the transactions it contains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, deriving `tx_root` from the transaction list.
    pub fn new(previous: BlockHash, timestamp: u64, nonce: u64, transactions: Vec<Transaction>) -> Self {
        let tx_root = Self::compute_tx_root(&transactions);
        Self {
            header: BlockHeader {
                version: CURRENT_BLOCK_VERSION,
                previous,
                tx_root,
                timestamp,
                nonce,
            },
            transactions,
        }
    }

    /// Digest of the concatenated transaction hashes, in block order.
    pub fn compute_tx_root(transactions: &[Transaction]) -> [u8; 32] {
        let hashes: Vec<TxHash> = transactions.iter().map(Transaction::compute_hash).collect();
        let parts: Vec<&[u8]> = hashes.iter().map(|h| h.as_bytes().as_slice()).collect();
        keel_crypto::blake2b_256_multi(&parts)
    }

    /// Compute the canonical hash of this block.
    ///
    /// Serializes the header fields in canonical order, then hashes with
    /// Blake2b-256:
    /// 0. version (4 bytes, big-endian)
    /// 1. previous (32 bytes)
    /// 2. tx_root (32 bytes)
    /// 3. timestamp (8 bytes, big-endian)
    /// 4. nonce (8 bytes, big-endian)
    pub fn compute_hash(&self) -> BlockHash {
        let mut buffer = Vec::with_capacity(84);
        buffer.extend_from_slice(&self.header.version.to_be_bytes());
        buffer.extend_from_slice(self.header.previous.as_bytes());
        buffer.extend_from_slice(&self.header.tx_root);
        buffer.extend_from_slice(&self.header.timestamp.to_be_bytes());
        buffer.extend_from_slice(&self.header.nonce.to_be_bytes());
        BlockHash::new(blake2b_256(&buffer))
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError(e.to_string()))
    }

    /// Deserialize a stored block payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

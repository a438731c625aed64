//! Chain tip — the (hash, height) pair tracking repository progress.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::block::BlockHash;

/// Size of the encoded tip: 32-byte hash followed by a big-endian u64 height.
pub const TIP_ENCODED_LEN: usize = 40;

/// Raised when a persisted tip row does not decode.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("chain tip row has {actual} bytes, expected {TIP_ENCODED_LEN}")]
pub struct TipDecodeError {
    pub actual: usize,
}

/// The most recent block whose state is reflected in the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub hash: BlockHash,
    pub height: u64,
}

impl ChainTip {
    pub fn new(hash: BlockHash, height: u64) -> Self {
        Self { hash, height }
    }

    /// Encode as `hash(32) ++ height_be(8)`.
    pub fn to_bytes(&self) -> [u8; TIP_ENCODED_LEN] {
        let mut out = [0u8; TIP_ENCODED_LEN];
        out[..32].copy_from_slice(self.hash.as_bytes());
        out[32..].copy_from_slice(&self.height.to_be_bytes());
        out
    }

    /// Decode from the fixed 40-byte on-disk form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TipDecodeError> {
        if bytes.len() != TIP_ENCODED_LEN {
            return Err(TipDecodeError {
                actual: bytes.len(),
            });
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[..32]);
        let mut height = [0u8; 8];
        height.copy_from_slice(&bytes[32..]);
        Ok(Self {
            hash: BlockHash::new(hash),
            height: u64::from_be_bytes(height),
        })
    }
}

impl fmt::Display for ChainTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let tip = ChainTip::new(BlockHash::new([7u8; 32]), 1_234_567);
        let decoded = ChainTip::from_bytes(&tip.to_bytes()).unwrap();
        assert_eq!(decoded, tip);
    }

    #[test]
    fn rejects_short_row() {
        let err = ChainTip::from_bytes(&[0u8; 39]).unwrap_err();
        assert_eq!(err.actual, 39);
    }

    #[test]
    fn rejects_long_row() {
        assert!(ChainTip::from_bytes(&[0u8; 41]).is_err());
    }

    #[test]
    fn height_is_big_endian() {
        let tip = ChainTip::new(BlockHash::ZERO, 1);
        let bytes = tip.to_bytes();
        assert_eq!(bytes[39], 1);
        assert_eq!(&bytes[32..39], &[0u8; 7]);
    }
}

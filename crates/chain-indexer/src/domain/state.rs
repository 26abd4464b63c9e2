//! # Sync State
//!
//! The persisted tip of one index, written in the same batch as the index
//! deltas it describes.

use shared_types::{ChainEntry, DecodeError, Hash};

/// Last block applied to an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSyncState {
    pub tip_hash: Hash,
    pub tip_height: u32,
}

impl IndexSyncState {
    /// Encoded size: hash (32) + height (4, LE).
    pub const SIZE: usize = 36;

    pub fn new(tip_hash: Hash, tip_height: u32) -> Self {
        Self {
            tip_hash,
            tip_height,
        }
    }

    /// State after applying `entry`.
    pub fn from_entry(entry: &ChainEntry) -> Self {
        Self::new(entry.hash, entry.height)
    }

    /// State after undoing `entry`: its parent becomes the tip.
    ///
    /// Returns `None` for genesis, which has no parent to rewind to.
    pub fn parent_of(entry: &ChainEntry) -> Option<Self> {
        entry
            .height
            .checked_sub(1)
            .map(|height| Self::new(entry.prev_hash, height))
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..32].copy_from_slice(&self.tip_hash);
        buf[32..].copy_from_slice(&self.tip_height.to_le_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() != Self::SIZE {
            return Err(DecodeError::InvalidLength {
                what: "sync state",
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut tip_hash = [0u8; 32];
        tip_hash.copy_from_slice(&data[..32]);
        let mut height = [0u8; 4];
        height.copy_from_slice(&data[32..]);
        Ok(Self::new(tip_hash, u32::from_le_bytes(height)))
    }
}

/// Lifecycle of an indexer instance.
///
/// `Closed -> Opening -> Synced <-> Syncing -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerStatus {
    Closed,
    Opening,
    /// Tip matches the chain as of the last event.
    Synced,
    /// Rewinding or replaying towards the chain tip.
    Syncing,
}

impl IndexerStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, IndexerStatus::Closed)
    }
}

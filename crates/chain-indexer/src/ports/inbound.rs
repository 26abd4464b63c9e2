//! # Inbound Ports (Driving Ports)
//!
//! [`BlockIndexer`] is what the framework drives. A concrete index turns a
//! block into key-value deltas; the framework appends its own bookkeeping
//! and commits everything as one batch.

use block_storage::{BatchOperation, KeyValueStore};
use shared_types::{Block, ChainEntry, CoinView};

use crate::domain::IndexerError;

/// A derived index maintained in lock-step with the chain.
///
/// Both methods must be deterministic for the same inputs so a failed
/// commit can be retried at the same height.
pub trait BlockIndexer: Send + Sync {
    /// Deltas applying `block` at `entry`.
    ///
    /// `store` reflects the index as of the parent block.
    fn index_block(
        &self,
        store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError>;

    /// Exact inverse of [`index_block`](Self::index_block).
    ///
    /// `store` reflects the index with `block` applied.
    fn unindex_block(
        &self,
        store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError>;
}

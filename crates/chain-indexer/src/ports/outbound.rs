//! # Outbound Ports (Driven Ports)
//!
//! The chain collaborator. It owns validation, the block tree and the UTXO
//! set; indexers only read from it.

use async_trait::async_trait;
use shared_types::{Block, ChainEntry, Coin, CoinView, Hash};
use thiserror::Error;

/// Errors reported by the chain collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Collaborator could not serve the request.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// Collaborator's own state is inconsistent.
    #[error("Chain inconsistent: {0}")]
    Inconsistent(String),
}

/// Read access to the validated chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current best entry.
    async fn get_tip(&self) -> Result<ChainEntry, ChainError>;

    /// Entry by block hash, on the main chain or not.
    async fn get_entry(&self, hash: &Hash) -> Result<Option<ChainEntry>, ChainError>;

    /// Main-chain entry at `height`.
    async fn get_entry_by_height(&self, height: u32) -> Result<Option<ChainEntry>, ChainError>;

    /// Block body by hash.
    async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, ChainError>;

    /// Outputs spent by `block`, keyed by outpoint.
    ///
    /// Must also cover blocks that have since left the main chain so they
    /// can be disconnected.
    async fn get_block_view(&self, block: &Block) -> Result<CoinView, ChainError>;

    /// Unspent output on the current main chain.
    async fn get_coin(&self, hash: &Hash, index: u32) -> Result<Option<Coin>, ChainError>;

    /// Whether `entry` is part of the current main chain.
    async fn is_main_chain(&self, entry: &ChainEntry) -> Result<bool, ChainError>;
}

//! # Indexer Errors
//!
//! - Storage and chain failures propagate unchanged
//! - A missing ancestor, block or filter header is fatal; the chain
//!   collaborator cannot supply what the index needs
//! - Bad pagination input is a user error and returns no partial results

use block_storage::KVStoreError;
use shared_types::{short_hex, DecodeError, Hash, OutPoint};
use thiserror::Error;

use crate::ports::outbound::ChainError;

/// Errors raised by the indexer framework and the concrete indexers.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Index key-value store failure.
    #[error(transparent)]
    Storage(#[from] KVStoreError),

    /// Chain collaborator failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The chain cannot supply an entry needed to rewind or replay.
    #[error("Missing ancestor at height {height}")]
    MissingAncestor { height: u32 },

    /// The chain knows an entry but not its block body.
    #[error("Missing block {}", short_hex(.hash))]
    MissingBlock { hash: Hash },

    /// Predecessor filter header absent; the header chain cannot continue.
    #[error("Missing filter header for {}", short_hex(.hash))]
    MissingFilterHeader { hash: Hash },

    /// A spent or listed output could not be resolved.
    #[error("Missing coin {}:{index}", short_hex(.hash))]
    MissingCoin { hash: Hash, index: u32 },

    /// Stored index value could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Pagination limit is zero or above the configured maximum.
    #[error("Invalid limit {requested}: must be between 1 and {max}")]
    InvalidLimit { requested: usize, max: usize },

    /// `after` cursor is not indexed for the queried address.
    #[error("Invalid cursor {}: not indexed for this address", short_hex(.hash))]
    InvalidCursor { hash: Hash },

    /// Index was written with an incompatible key layout.
    #[error("Index layout version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Operation attempted before `open()` or after `close()`.
    #[error("Indexer {name} is not open")]
    NotOpen { name: String },
}

impl IndexerError {
    /// Errors caused by caller input rather than storage or chain state.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            IndexerError::InvalidLimit { .. } | IndexerError::InvalidCursor { .. }
        )
    }

    pub(crate) fn missing_coin(outpoint: &OutPoint) -> Self {
        IndexerError::MissingCoin {
            hash: outpoint.hash,
            index: outpoint.index,
        }
    }

    pub(crate) fn corrupt(what: &'static str, message: impl Into<String>) -> Self {
        IndexerError::Decode(DecodeError::Malformed {
            what,
            message: message.into(),
        })
    }
}

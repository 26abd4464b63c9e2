//! # Inbound Ports (Driving Ports)
//!
//! The block store API exposed to the chain and to query layers.

use async_trait::async_trait;
use shared_types::Hash;

use crate::domain::errors::StorageError;
use crate::domain::location::BlockLocation;

/// Content-addressed storage for raw block bytes.
///
/// Implementations: [`crate::FileBlockStore`] (flat files on disk) and
/// [`crate::MemoryBlockStore`] (tests and ephemeral nodes).
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `data` under `hash` and return where it landed.
    ///
    /// Writing a hash that is already stored returns the existing location.
    ///
    /// ## Errors
    ///
    /// - `RecordTooLarge`: payload exceeds the configured maximum
    /// - `Io`: the append failed; nothing was recorded
    async fn write_block(&self, hash: &Hash, data: &[u8]) -> Result<BlockLocation, StorageError>;

    /// Read the bytes stored under `hash`.
    ///
    /// Returns `Ok(None)` for an unknown hash. Integrity violations are
    /// errors, never `None`.
    async fn read_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;

    /// Forget `hash`. Returns `false` if it was not stored.
    async fn prune_block(&self, hash: &Hash) -> Result<bool, StorageError>;

    /// Whether `hash` is stored.
    async fn has(&self, hash: &Hash) -> Result<bool, StorageError>;
}

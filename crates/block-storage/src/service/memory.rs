use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::Hash;

use crate::domain::errors::StorageError;
use crate::domain::location::BlockLocation;
use crate::domain::record::frame_size;
use crate::ports::inbound::BlockStore;

#[derive(Default)]
struct MemoryState {
    blocks: HashMap<Hash, (BlockLocation, Vec<u8>)>,
    /// Virtual append offset, as if every block went to one file.
    offset: u32,
}

/// Block store that keeps everything in memory.
///
/// Locations are virtual (file 0, monotonically increasing offsets) so
/// callers observe the same shapes as with [`crate::FileBlockStore`].
pub struct MemoryBlockStore {
    max_record_size: usize,
    state: RwLock<MemoryState>,
}

impl MemoryBlockStore {
    pub fn new(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().blocks.is_empty()
    }
}

impl Default for MemoryBlockStore {
    fn default() -> Self {
        Self::new(crate::domain::config::DEFAULT_MAX_RECORD_SIZE)
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn write_block(&self, hash: &Hash, data: &[u8]) -> Result<BlockLocation, StorageError> {
        if data.len() > self.max_record_size {
            return Err(StorageError::RecordTooLarge {
                size: data.len(),
                max_size: self.max_record_size,
            });
        }

        let mut state = self.state.write();
        if let Some((location, _)) = state.blocks.get(hash) {
            return Ok(*location);
        }
        let length = frame_size(data.len()) as u32;
        let location = BlockLocation::new(0, state.offset, length);
        state.offset = state.offset.saturating_add(length);
        state.blocks.insert(*hash, (location, data.to_vec()));
        Ok(location)
    }

    async fn read_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.state.read().blocks.get(hash).map(|(_, data)| data.clone()))
    }

    async fn prune_block(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.state.write().blocks.remove(hash).is_some())
    }

    async fn has(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.state.read().blocks.contains_key(hash))
    }
}

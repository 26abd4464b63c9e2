//! # Indexer Framework
//!
//! Keeps one derived index in step with the chain:
//!
//! - `open`: check the layout version, index genesis on first use, then
//!   catch up to the chain tip
//! - `connect` / `disconnect`: apply or undo the block at the tip; any
//!   other relationship to the tip falls back to a resync
//! - resync: walk back to the last block both sides agree on, undo
//!   everything above it, then replay the main chain forward
//!
//! Every block's index deltas are committed in one batch together with the
//! new sync state (`R`) and the height record (`h`), so after a crash the
//! index always corresponds to some real chain prefix.

use std::sync::Arc;

use block_storage::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use shared_types::{short_hex, Block, ChainEntry, CoinView, Hash};
use tokio::sync::Mutex;

use crate::domain::config::IndexerConfig;
use crate::domain::errors::IndexerError;
use crate::domain::layout::{height_key, state_key, version_key, LAYOUT_VERSION};
use crate::domain::state::{IndexSyncState, IndexerStatus};
use crate::ports::inbound::BlockIndexer;
use crate::ports::outbound::{ChainClient, ChainError};

struct Progress {
    status: IndexerStatus,
    /// `None` while closed.
    tip: Option<IndexSyncState>,
}

/// A [`BlockIndexer`] driven against a chain collaborator.
pub struct Indexer<I, KV, C> {
    indexer: I,
    store: KV,
    chain: Arc<C>,
    config: IndexerConfig,
    progress: RwLock<Progress>,
    /// Serializes open, close and every state transition.
    sync: Mutex<()>,
}

impl<I, KV, C> Indexer<I, KV, C>
where
    I: BlockIndexer,
    KV: KeyValueStore,
    C: ChainClient,
{
    pub fn new(indexer: I, store: KV, chain: Arc<C>, config: IndexerConfig) -> Self {
        Self {
            indexer,
            store,
            chain,
            config,
            progress: RwLock::new(Progress {
                status: IndexerStatus::Closed,
                tip: None,
            }),
            sync: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// The index's key-value store.
    pub fn store(&self) -> &KV {
        &self.store
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn status(&self) -> IndexerStatus {
        self.progress.read().status
    }

    /// Last applied block, or `None` while closed.
    pub fn tip(&self) -> Option<IndexSyncState> {
        self.progress.read().tip
    }

    pub fn height(&self) -> Option<u32> {
        self.tip().map(|tip| tip.tip_height)
    }

    /// Load the sync state (indexing genesis on first use) and catch up
    /// with the chain.
    pub async fn open(&self) -> Result<(), IndexerError> {
        let _guard = self.sync.lock().await;
        if self.status().is_open() {
            return Ok(());
        }

        self.set_status(IndexerStatus::Opening);
        let result = self.load_and_sync().await;
        match &result {
            Ok(state) => {
                self.set_status(IndexerStatus::Synced);
                tracing::info!(
                    "[indexer:{}] ✅ Opened at height {} ({})",
                    self.name(),
                    state.tip_height,
                    short_hex(&state.tip_hash)
                );
            }
            Err(err) => {
                self.mark_closed();
                tracing::error!("[indexer:{}] ❌ Open failed: {}", self.name(), err);
            }
        }
        result.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), IndexerError> {
        let _guard = self.sync.lock().await;
        if !self.status().is_open() {
            return Ok(());
        }
        self.mark_closed();
        tracing::info!("[indexer:{}] 🔒 Closed", self.name());
        Ok(())
    }

    /// Chain connected `entry`.
    ///
    /// Applied directly when it extends the tip; otherwise the index is
    /// resynced against the chain.
    pub async fn connect(
        &self,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<(), IndexerError> {
        let _guard = self.sync.lock().await;
        let state = self.ensure_open()?;

        if entry.hash == state.tip_hash {
            return Ok(());
        }
        if state.tip_height.checked_add(1) == Some(entry.height) && entry.prev_hash == state.tip_hash
        {
            self.apply_connect(entry, block, view)?;
            return Ok(());
        }

        tracing::warn!(
            "[indexer:{}] ⚠️ Block {} at height {} does not extend tip {} at height {}",
            self.name(),
            short_hex(&entry.hash),
            entry.height,
            short_hex(&state.tip_hash),
            state.tip_height
        );
        self.resync(state).await
    }

    /// Chain disconnected `entry`.
    ///
    /// Undone directly when it is the tip; otherwise the index is resynced.
    pub async fn disconnect(
        &self,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<(), IndexerError> {
        let _guard = self.sync.lock().await;
        let state = self.ensure_open()?;

        if entry.hash == state.tip_hash {
            self.apply_disconnect(entry, block, view)?;
            return Ok(());
        }

        tracing::warn!(
            "[indexer:{}] ⚠️ Disconnect of {} at height {} is not the tip {}",
            self.name(),
            short_hex(&entry.hash),
            entry.height,
            short_hex(&state.tip_hash)
        );
        self.resync(state).await
    }

    /// Bring the index to the chain's current tip.
    pub async fn sync(&self) -> Result<(), IndexerError> {
        let _guard = self.sync.lock().await;
        let state = self.ensure_open()?;
        self.resync(state).await
    }

    /// Current tip, or `NotOpen`.
    pub(crate) fn ensure_open(&self) -> Result<IndexSyncState, IndexerError> {
        let progress = self.progress.read();
        match (progress.status, progress.tip) {
            (IndexerStatus::Closed, _) | (_, None) => Err(IndexerError::NotOpen {
                name: self.config.name.clone(),
            }),
            (_, Some(tip)) => Ok(tip),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    async fn load_and_sync(&self) -> Result<IndexSyncState, IndexerError> {
        let stored = self.check_version()?;
        let state = match stored {
            Some(state) => state,
            None => self.index_genesis().await?,
        };
        self.set_tip(state);

        self.set_status(IndexerStatus::Syncing);
        self.sync_to_chain(state).await
    }

    /// Stored sync state, once the layout version is known to match.
    fn check_version(&self) -> Result<Option<IndexSyncState>, IndexerError> {
        let version = self.store.get(&version_key())?;
        let state = self.store.get(&state_key())?;

        match (version, state) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(IndexerError::VersionMismatch {
                expected: LAYOUT_VERSION,
                found: 0,
            }),
            (Some(raw), state) => {
                let found = decode_version(&raw)?;
                if found != LAYOUT_VERSION {
                    return Err(IndexerError::VersionMismatch {
                        expected: LAYOUT_VERSION,
                        found,
                    });
                }
                state
                    .map(|raw| IndexSyncState::from_bytes(&raw).map_err(IndexerError::from))
                    .transpose()
            }
        }
    }

    /// Index genesis and write version plus state in one batch.
    async fn index_genesis(&self) -> Result<IndexSyncState, IndexerError> {
        let genesis = self
            .chain
            .get_entry_by_height(0)
            .await?
            .ok_or(IndexerError::MissingAncestor { height: 0 })?;
        let (block, view) = self.fetch(&genesis).await?;

        let state = IndexSyncState::from_entry(&genesis);
        let mut ops = self
            .indexer
            .index_block(&self.store, &genesis, &block, &view)?;
        ops.push(BatchOperation::put(
            version_key(),
            LAYOUT_VERSION.to_le_bytes().to_vec(),
        ));
        ops.push(BatchOperation::put(height_key(0), genesis.hash.to_vec()));
        ops.push(BatchOperation::put(state_key(), state.to_bytes().to_vec()));
        self.store.atomic_batch_write(ops)?;

        tracing::info!(
            "[indexer:{}] 🌱 Indexed genesis {}",
            self.name(),
            short_hex(&genesis.hash)
        );
        Ok(state)
    }

    fn set_status(&self, status: IndexerStatus) {
        self.progress.write().status = status;
    }

    fn set_tip(&self, tip: IndexSyncState) {
        self.progress.write().tip = Some(tip);
    }

    fn mark_closed(&self) {
        let mut progress = self.progress.write();
        progress.status = IndexerStatus::Closed;
        progress.tip = None;
    }

    // =========================================================================
    // Sync
    // =========================================================================

    async fn resync(&self, state: IndexSyncState) -> Result<(), IndexerError> {
        self.set_status(IndexerStatus::Syncing);
        let result = self.sync_to_chain(state).await;
        // Each block is applied atomically, so the tip is consistent either way.
        self.set_status(IndexerStatus::Synced);
        let synced = result?;
        tracing::info!(
            "[indexer:{}] 🔄 Resynced to height {} ({})",
            self.name(),
            synced.tip_height,
            short_hex(&synced.tip_hash)
        );
        Ok(())
    }

    /// Rewind to the fork point, then replay the main chain up to its tip.
    async fn sync_to_chain(&self, mut state: IndexSyncState) -> Result<IndexSyncState, IndexerError> {
        let chain_tip = self.chain.get_tip().await?;

        let fork = self.find_fork(&state).await?;
        if fork < state.tip_height {
            tracing::warn!(
                "[indexer:{}] ⚠️ Rewinding {} blocks from height {} to fork point {}",
                self.name(),
                state.tip_height - fork,
                state.tip_height,
                fork
            );
        }
        while state.tip_height > fork {
            state = self.disconnect_tip(&state).await?;
        }

        for height in state.tip_height + 1..=chain_tip.height {
            let entry = self
                .chain
                .get_entry_by_height(height)
                .await?
                .ok_or(IndexerError::MissingAncestor { height })?;
            if entry.prev_hash != state.tip_hash {
                return Err(ChainError::Inconsistent(format!(
                    "main chain changed during sync at height {}",
                    height
                ))
                .into());
            }
            let (block, view) = self.fetch(&entry).await?;
            state = self.apply_connect(&entry, &block, &view)?;
        }

        Ok(state)
    }

    /// Highest height where the indexed block is on the main chain.
    async fn find_fork(&self, state: &IndexSyncState) -> Result<u32, IndexerError> {
        if let Some(entry) = self.chain.get_entry(&state.tip_hash).await? {
            if self.chain.is_main_chain(&entry).await? {
                return Ok(state.tip_height);
            }
        }

        let mut height = state.tip_height;
        loop {
            let local = self.indexed_hash(height)?;
            if let Some(main) = self.chain.get_entry_by_height(height).await? {
                if main.hash == local {
                    return Ok(height);
                }
            }
            // Disagreeing on genesis means a different chain altogether.
            height = height
                .checked_sub(1)
                .ok_or(IndexerError::MissingAncestor { height: 0 })?;
        }
    }

    fn indexed_hash(&self, height: u32) -> Result<Hash, IndexerError> {
        let raw = self.store.get(&height_key(height))?.ok_or_else(|| {
            IndexerError::corrupt("height record", format!("nothing indexed at height {}", height))
        })?;
        raw.as_slice()
            .try_into()
            .map_err(|_| IndexerError::corrupt("height record", format!("bad length {}", raw.len())))
    }

    async fn disconnect_tip(&self, state: &IndexSyncState) -> Result<IndexSyncState, IndexerError> {
        let entry = self
            .chain
            .get_entry(&state.tip_hash)
            .await?
            .ok_or(IndexerError::MissingAncestor {
                height: state.tip_height,
            })?;
        let (block, view) = self.fetch(&entry).await?;
        self.apply_disconnect(&entry, &block, &view)
    }

    async fn fetch(&self, entry: &ChainEntry) -> Result<(Block, CoinView), IndexerError> {
        let block = self
            .chain
            .get_block(&entry.hash)
            .await?
            .ok_or(IndexerError::MissingBlock { hash: entry.hash })?;
        let view = self.chain.get_block_view(&block).await?;
        Ok((block, view))
    }

    // =========================================================================
    // Atomic transitions
    // =========================================================================

    fn apply_connect(
        &self,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<IndexSyncState, IndexerError> {
        let next = IndexSyncState::from_entry(entry);

        let mut ops = self.indexer.index_block(&self.store, entry, block, view)?;
        ops.push(BatchOperation::put(height_key(entry.height), entry.hash.to_vec()));
        ops.push(BatchOperation::put(state_key(), next.to_bytes().to_vec()));
        self.store.atomic_batch_write(ops)?;

        self.set_tip(next);
        tracing::debug!(
            "[indexer:{}] Connected {} at height {}",
            self.name(),
            short_hex(&entry.hash),
            entry.height
        );
        Ok(next)
    }

    fn apply_disconnect(
        &self,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<IndexSyncState, IndexerError> {
        let parent =
            IndexSyncState::parent_of(entry).ok_or(IndexerError::MissingAncestor { height: 0 })?;

        let mut ops = self.indexer.unindex_block(&self.store, entry, block, view)?;
        ops.push(BatchOperation::delete(height_key(entry.height)));
        ops.push(BatchOperation::put(state_key(), parent.to_bytes().to_vec()));
        self.store.atomic_batch_write(ops)?;

        self.set_tip(parent);
        tracing::debug!(
            "[indexer:{}] Disconnected {} at height {}",
            self.name(),
            short_hex(&entry.hash),
            entry.height
        );
        Ok(parent)
    }
}

fn decode_version(raw: &[u8]) -> Result<u32, IndexerError> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| IndexerError::corrupt("layout version", format!("bad length {}", raw.len())))?;
    Ok(u32::from_le_bytes(bytes))
}

//! # Flat-File Block Store
//!
//! Raw block bytes are appended as framed records to rotating block files;
//! `hash -> location` pointers and per-file accounting go through a
//! pending-write buffer in front of the metadata store.
//!
//! ## Durability ordering
//!
//! Pointers are committed to the metadata store only after the bytes they
//! point at have been fsync'd. Rotation syncs the old file before the new
//! one is opened, so a crash loses at most the uncommitted tail of the
//! current file.

use std::io::SeekFrom;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lru::LruCache;
use shared_types::{short_hex, Hash};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::adapters::lock::DirectoryLock;
use crate::adapters::storage::PendingWriteStore;
use crate::domain::config::BlockStoreConfig;
use crate::domain::errors::StorageError;
use crate::domain::layout::KeyPrefix;
use crate::domain::location::{BlockLocation, FileRecord};
use crate::domain::record::{decode_frame, encode_frame};
use crate::ports::inbound::BlockStore;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use crate::service::cursor::{block_file_path, parse_block_file_name, FileCursor};

/// Mutable state, owned by whoever holds the store's mutex.
struct StoreState {
    /// `None` once closed.
    cursor: Option<FileCursor>,
    /// Read handles by file index, evicted least-recently-opened first.
    /// Never holds the write handle.
    readers: LruCache<u32, File>,
    /// Writes and prunes buffered since the last commit.
    uncommitted: usize,
    lock: Option<DirectoryLock>,
}

impl StoreState {
    fn cursor(&mut self) -> Result<&mut FileCursor, StorageError> {
        self.cursor.as_mut().ok_or(StorageError::Closed)
    }
}

/// Block store over rotating flat files.
pub struct FileBlockStore<KV: KeyValueStore> {
    dir: PathBuf,
    config: BlockStoreConfig,
    meta: PendingWriteStore<KV>,
    state: Mutex<StoreState>,
}

impl<KV: KeyValueStore> FileBlockStore<KV> {
    /// Open the store in `dir`, creating it if needed.
    ///
    /// Takes the directory lock, then resumes the highest-numbered block
    /// file at its current end (or starts file 0).
    pub async fn open(
        dir: impl AsRef<Path>,
        config: BlockStoreConfig,
        meta: KV,
    ) -> Result<Self, StorageError> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let lock_dir = dir.clone();
        let timeout = config.lock_timeout;
        let lock = tokio::task::spawn_blocking(move || DirectoryLock::acquire(&lock_dir, timeout))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        let files = list_block_files(&dir).await?;
        let current = files.last().copied().unwrap_or(0);
        let cursor = FileCursor::open(&dir, current).await?;

        tracing::info!(
            "[block-store] 📂 Opened {} ({} block files, writing file {} at offset {})",
            dir.display(),
            files.len().max(1),
            current,
            cursor.offset()
        );

        let capacity = NonZeroUsize::new(config.read_handle_capacity()).unwrap_or(NonZeroUsize::MIN);

        let store = Self {
            dir,
            config,
            meta: PendingWriteStore::new(meta),
            state: Mutex::new(StoreState {
                cursor: Some(cursor),
                readers: LruCache::new(capacity),
                uncommitted: 0,
                lock: Some(lock),
            }),
        };
        store.reclaim_empty_files().await?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &BlockStoreConfig {
        &self.config
    }

    /// Path of block file `file_index`.
    pub fn file_path(&self, file_index: u32) -> PathBuf {
        block_file_path(&self.dir, file_index)
    }

    /// Metadata store, including buffered writes.
    pub fn metadata(&self) -> &PendingWriteStore<KV> {
        &self.meta
    }

    /// Where `hash` is stored, if anywhere.
    pub async fn location(&self, hash: &Hash) -> Result<Option<BlockLocation>, StorageError> {
        self.lookup(hash)
    }

    /// Accounting record for block file `file_index`.
    pub async fn file_record(&self, file_index: u32) -> Result<Option<FileRecord>, StorageError> {
        self.read_file_record(file_index)
    }

    /// Index of the file currently open for writing.
    pub async fn current_file(&self) -> Result<u32, StorageError> {
        let mut state = self.state.lock().await;
        Ok(state.cursor()?.file_index())
    }

    /// Number of read handles currently open.
    pub async fn open_read_handles(&self) -> usize {
        self.state.lock().await.readers.len()
    }

    /// Sync the current file and commit every buffered pointer.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        self.commit(&mut state).await
    }

    /// Flush, then release every handle and the directory lock.
    pub async fn close(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if state.cursor.is_none() {
            return Ok(());
        }
        self.commit(&mut state).await?;

        state.cursor = None;
        state.readers.clear();
        state.lock = None;
        tracing::info!("[block-store] 🔒 Closed {}", self.dir.display());
        Ok(())
    }

    // =========================================================================
    // METADATA
    // =========================================================================

    fn lookup(&self, hash: &Hash) -> Result<Option<BlockLocation>, StorageError> {
        match self.meta.get(&KeyPrefix::block_key(hash))? {
            Some(raw) => BlockLocation::from_bytes(&raw)
                .map(Some)
                .map_err(|e| StorageError::corrupt_location(hash, e.to_string())),
            None => Ok(None),
        }
    }

    fn read_file_record(&self, file_index: u32) -> Result<Option<FileRecord>, StorageError> {
        match self.meta.get(&KeyPrefix::file_key(file_index))? {
            Some(raw) => FileRecord::from_bytes(&raw).map(Some).map_err(|e| {
                StorageError::CorruptMetadata {
                    key: format!("file {}", file_index),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    /// Make the current file durable, then commit buffered metadata.
    async fn commit(&self, state: &mut StoreState) -> Result<(), StorageError> {
        state.cursor()?.sync().await?;
        let committed = self.meta.commit()?;
        if committed > 0 {
            tracing::debug!("[block-store] Committed {} metadata operations", committed);
        }
        state.uncommitted = 0;
        Ok(())
    }

    async fn note_uncommitted(&self, state: &mut StoreState) -> Result<(), StorageError> {
        state.uncommitted += 1;
        if state.uncommitted >= self.config.commit_interval {
            self.commit(state).await?;
        }
        Ok(())
    }

    // =========================================================================
    // FILES
    // =========================================================================

    /// Sync and close the current file, then continue in the next one.
    ///
    /// The old file is reclaimed right away if pruning emptied it while it
    /// was still current.
    async fn rollover(&self, state: &mut StoreState) -> Result<(), StorageError> {
        let mut previous = state.cursor.take().ok_or(StorageError::Closed)?;
        if let Err(e) = previous.sync().await {
            state.cursor = Some(previous);
            return Err(e.into());
        }
        let previous_index = previous.file_index();
        let previous_size = previous.offset();
        drop(previous);

        let next_index = previous_index + 1;
        match FileCursor::open(&self.dir, next_index).await {
            Ok(next) => state.cursor = Some(next),
            Err(e) => {
                // Resume the old file so the store keeps a writer.
                state.cursor = Some(FileCursor::open(&self.dir, previous_index).await?);
                return Err(e.into());
            }
        }

        tracing::info!(
            "[block-store] 🔄 Rolled over from file {} ({} bytes) to file {}",
            previous_index,
            previous_size,
            next_index
        );

        self.commit(state).await?;
        self.reclaim_if_empty(state, previous_index).await?;
        Ok(())
    }

    /// Delete `file_index` and its record once no block lives in it.
    async fn reclaim_if_empty(
        &self,
        state: &mut StoreState,
        file_index: u32,
    ) -> Result<bool, StorageError> {
        match self.read_file_record(file_index)? {
            Some(record) if record.blocks == 0 => {}
            _ => return Ok(false),
        }
        self.meta
            .atomic_batch_write(vec![BatchOperation::delete(KeyPrefix::file_key(file_index))])?;
        // No committed pointer may outlive the file it points into.
        self.commit(state).await?;
        self.remove_file(state, file_index).await?;
        Ok(true)
    }

    /// Reclaim every emptied file except the current one, covering a
    /// crash between rollover and reclamation.
    async fn reclaim_empty_files(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let current = state.cursor()?.file_index();

        let records = self.meta.prefix_scan(&[KeyPrefix::File.as_byte()])?;
        for (key, _) in records {
            match KeyPrefix::parse_file_key(&key) {
                Some(file_index) if file_index != current => {
                    self.reclaim_if_empty(&mut state, file_index).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn read_frame(
        &self,
        state: &mut StoreState,
        location: &BlockLocation,
    ) -> Result<Vec<u8>, StorageError> {
        let current = state.cursor()?;
        let known_size = (current.file_index() == location.file).then(|| current.offset() as u64);

        if !state.readers.contains(&location.file) {
            let path = self.file_path(location.file);
            let handle = match File::open(&path).await {
                Ok(handle) => handle,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::MissingFile {
                        file: location.file,
                    })
                }
                Err(e) => return Err(e.into()),
            };
            if let Some((evicted, _)) = state.readers.push(location.file, handle) {
                tracing::debug!("[block-store] Evicted read handle for file {}", evicted);
            }
        }
        let handle = state
            .readers
            .peek_mut(&location.file)
            .ok_or(StorageError::MissingFile {
                file: location.file,
            })?;

        let file_size = match known_size {
            Some(size) => size,
            None => handle.metadata().await?.len(),
        };
        if location.end() > file_size {
            return Err(StorageError::OutOfBounds {
                file: location.file,
                offset: location.offset,
                length: location.length,
                file_size,
            });
        }

        let mut frame = vec![0u8; location.length as usize];
        handle.seek(SeekFrom::Start(location.offset as u64)).await?;
        handle.read_exact(&mut frame).await?;
        Ok(frame)
    }

    async fn remove_file(&self, state: &mut StoreState, file_index: u32) -> Result<(), StorageError> {
        state.readers.pop(&file_index);
        match tokio::fs::remove_file(self.file_path(file_index)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("[block-store] 🗑️ Removed empty block file {}", file_index);
        Ok(())
    }
}

#[async_trait]
impl<KV: KeyValueStore> BlockStore for FileBlockStore<KV> {
    async fn write_block(&self, hash: &Hash, data: &[u8]) -> Result<BlockLocation, StorageError> {
        if data.len() > self.config.max_record_size {
            return Err(StorageError::RecordTooLarge {
                size: data.len(),
                max_size: self.config.max_record_size,
            });
        }

        let mut state = self.state.lock().await;
        state.cursor()?;

        if let Some(existing) = self.lookup(hash)? {
            return Ok(existing);
        }

        let frame = encode_frame(self.config.magic, data);
        let cursor = state.cursor()?;
        if cursor.offset() as u64 + frame.len() as u64 > self.config.max_file_size as u64 {
            self.rollover(&mut state).await?;
        }

        let cursor = state.cursor()?;
        let start = cursor.append(&frame).await?;
        if self.config.sync_writes {
            cursor.sync().await?;
        }
        let location = BlockLocation::new(cursor.file_index(), start, frame.len() as u32);

        let mut record = self.read_file_record(location.file)?.unwrap_or_default();
        record.add_block(&location);
        self.meta.atomic_batch_write(vec![
            BatchOperation::put(KeyPrefix::block_key(hash), location.to_bytes()),
            BatchOperation::put(KeyPrefix::file_key(location.file), record.to_bytes()),
        ])?;

        tracing::debug!(
            "[block-store] 📦 Wrote block {} to file {} at offset {} ({} bytes)",
            short_hex(hash),
            location.file,
            location.offset,
            location.length
        );

        self.note_uncommitted(&mut state).await?;
        Ok(location)
    }

    async fn read_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        let mut state = self.state.lock().await;
        state.cursor()?;

        let Some(location) = self.lookup(hash)? else {
            return Ok(None);
        };
        let frame = self.read_frame(&mut state, &location).await?;
        decode_frame(self.config.magic, &location, &frame).map(Some)
    }

    async fn prune_block(&self, hash: &Hash) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let current_file = state.cursor()?.file_index();

        let Some(location) = self.lookup(hash)? else {
            return Ok(false);
        };
        let mut record = self.read_file_record(location.file)?.ok_or_else(|| {
            StorageError::corrupt_location(hash, format!("no record for file {}", location.file))
        })?;
        record.remove_block(&location);

        self.meta.atomic_batch_write(vec![
            BatchOperation::delete(KeyPrefix::block_key(hash)),
            BatchOperation::put(KeyPrefix::file_key(location.file), record.to_bytes()),
        ])?;
        tracing::debug!("[block-store] Pruned block {}", short_hex(hash));

        // An emptied current file waits for rollover or the next open.
        let reclaimed =
            location.file != current_file && self.reclaim_if_empty(&mut state, location.file).await?;
        if !reclaimed {
            self.note_uncommitted(&mut state).await?;
        }

        Ok(true)
    }

    async fn has(&self, hash: &Hash) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        state.cursor()?;
        Ok(self.lookup(hash)?.is_some())
    }
}

/// Indices of the block files in `dir`, ascending.
async fn list_block_files(dir: &Path) -> Result<Vec<u32>, StorageError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(index) = entry.file_name().to_str().and_then(parse_block_file_name) {
            files.push(index);
        }
    }
    files.sort_unstable();
    Ok(files)
}

//! # RocksDB Metadata Store
//!
//! Production implementation of [`KeyValueStore`], enabled with the
//! `rocksdb` feature. Batches map onto a RocksDB `WriteBatch`, which the
//! engine applies atomically.

use std::path::{Path, PathBuf};

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanOptions, ScanResult};

/// RocksDB tuning for the metadata workload.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 32MB)
    pub write_buffer_size: usize,
    /// fsync every write (default: true)
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Smaller buffers, no fsync.
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
            ..Self::new(path)
        }
    }
}

/// RocksDB-backed metadata store.
pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| rocks_error("open", e))?;
        tracing::info!("[block-store] Opened RocksDB at {}", config.path.display());

        Ok(Self { db, config })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn rocks_error(op: &str, err: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {} failed: {}", op, err),
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db.get(key).map_err(|e| rocks_error("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| rocks_error("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| rocks_error("delete", e))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| rocks_error("batch write", e))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| rocks_error("exists", e))
    }

    fn scan(&self, options: &ScanOptions) -> Result<ScanResult, KVStoreError> {
        if options.is_empty_range() {
            return Ok(Vec::new());
        }

        let mode = match (options.reverse, &options.gte, &options.lte) {
            (false, Some(gte), _) => IteratorMode::From(gte.as_slice(), Direction::Forward),
            (false, None, _) => IteratorMode::Start,
            (true, _, Some(lte)) => IteratorMode::From(lte.as_slice(), Direction::Reverse),
            (true, _, None) => IteratorMode::End,
        };
        let limit = options.limit.unwrap_or(usize::MAX);

        let mut results = Vec::new();
        for item in self.db.iterator(mode) {
            let (key, value) = item.map_err(|e| rocks_error("scan", e))?;
            if !options.contains(&key) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}

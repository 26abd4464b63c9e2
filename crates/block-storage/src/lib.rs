//! # Block Storage
//!
//! Durable, content-addressed storage for raw block bytes, plus the
//! ordered write buffer and key-value port shared with the indexers.
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Pending-write ordered map | `domain::treap` | Arena treap buffering inserts/removals |
//! | Record codec | `domain::record` | `magic, length, payload, crc32` frames |
//! | File cursor | `service::cursor` | The single writable block file |
//! | Block store | `service` | hash -> location, rotation, read-handle cache |
//! | Metadata port | `ports::outbound` | `KeyValueStore` with atomic batches and range scans |
//!
//! ## Invariants
//!
//! - A checksum mismatch is always an error; corrupted bytes are never returned
//! - A pointer is committed only after the bytes it points at are synced
//! - The write offset always equals the current file's true end
//! - Space is reclaimed by deleting whole files, never by compaction
//!
//! ## Usage
//!
//! ```ignore
//! use block_storage::{BlockStore, BlockStoreConfig, FileBlockStore, InMemoryKVStore};
//!
//! let store = FileBlockStore::open("/data/blocks", BlockStoreConfig::default(), InMemoryKVStore::new()).await?;
//! let location = store.write_block(&hash, &bytes).await?;
//! let bytes = store.read_block(&hash).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::lock::{DirectoryLock, LockError};
pub use adapters::storage::{FileBackedKVStore, InMemoryKVStore, PendingWriteStore};
#[cfg(feature = "rocksdb")]
pub use adapters::storage::{RocksDbConfig, RocksDbStore};
pub use domain::config::BlockStoreConfig;
pub use domain::errors::{KVStoreError, StorageError};
pub use domain::layout::KeyPrefix;
pub use domain::location::{BlockLocation, FileRecord};
pub use domain::treap::Treap;
pub use ports::inbound::BlockStore;
pub use ports::outbound::{BatchOperation, KeyValueStore, ScanOptions, ScanResult};
pub use service::{FileBlockStore, MemoryBlockStore};

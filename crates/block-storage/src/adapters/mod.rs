//! # Adapters Module
//!
//! - `storage`: `KeyValueStore` implementations and the pending-write buffer
//! - `lock`: block directory process lock

pub mod lock;
pub mod storage;

pub use lock::{DirectoryLock, LockError};
pub use storage::{FileBackedKVStore, InMemoryKVStore, PendingWriteStore};

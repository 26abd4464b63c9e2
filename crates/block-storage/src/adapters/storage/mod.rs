//! Storage Adapters
//!
//! Implementations of the `KeyValueStore` trait.

mod buffered;
mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use buffered::PendingWriteStore;
pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbStore};

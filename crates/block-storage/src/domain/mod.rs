//! # Domain Layer
//!
//! Pure storage logic with no I/O:
//!
//! - `config`: block store limits and durability knobs
//! - `errors`: storage and key-value error taxonomy
//! - `layout`: metadata key prefixes
//! - `location`: block location and per-file accounting records
//! - `record`: framed record codec
//! - `treap`: ordered map used to buffer pending metadata writes

pub mod config;
pub mod errors;
pub mod layout;
pub mod location;
pub mod record;
pub mod treap;

pub use config::BlockStoreConfig;
pub use errors::{KVStoreError, StorageError};
pub use layout::KeyPrefix;
pub use location::{BlockLocation, FileRecord};
pub use treap::Treap;

//! # Chain Indexer
//!
//! Derived indexes kept consistent with a reorganizing chain tip.
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Indexer framework | `service::indexer` | connect, disconnect, rewind and replay |
//! | Transaction index | `service::tx_index` | tx hash -> metadata |
//! | Address index | `service::addr_index` | address -> paginated tx hashes, unspent coins |
//! | Filter index | `service::filter_index` | block -> compact filter, filter header chain |
//! | Compact filters | `domain::gcs` | BIP 158 Golomb-coded sets |
//! | Chain port | `ports::outbound` | what the indexers read from the chain |
//!
//! ## Invariants
//!
//! - Index deltas and the sync state commit in one batch
//! - After any restart the index corresponds to a real chain prefix
//! - A failed block application never advances the sync state
//!
//! ## Usage
//!
//! ```ignore
//! use chain_indexer::{IndexerConfig, TxIndex, TxIndexer};
//!
//! let index = TxIndex::new(TxIndexer, store, chain.clone(), IndexerConfig::new("tx"));
//! index.open().await?;
//! index.connect(&entry, &block, &view).await?;
//! let meta = index.get_meta(&tx_hash)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::MemoryChain;
pub use domain::{
    GcsFilter, IndexSyncState, IndexerConfig, IndexerError, IndexerStatus, TxMeta,
};
pub use ports::{BlockIndexer, ChainClient, ChainError};
pub use service::{
    AddrIndex, AddrIndexer, AddressQuery, FilterIndex, FilterIndexer, Indexer, TxIndex,
    TxIndexer,
};

//! # Indexing Services
//!
//! - `indexer`: the sync state machine shared by every index
//! - `tx_index`, `addr_index`, `filter_index`: the concrete indexes and
//!   their query APIs

pub mod addr_index;
pub mod filter_index;
pub mod indexer;
pub mod tx_index;

pub use addr_index::{AddrIndex, AddrIndexer, AddressQuery};
pub use filter_index::{basic_filter, basic_filter_elements, FilterIndex, FilterIndexer};
pub use indexer::Indexer;
pub use tx_index::{TxIndex, TxIndexer};

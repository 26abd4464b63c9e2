//! # Block Store Services
//!
//! Implementations of the [`BlockStore`](crate::ports::inbound::BlockStore) port:
//!
//! - `flat_file`: rotating flat files plus buffered metadata (production)
//! - `memory`: everything in memory (tests, ephemeral nodes)
//! - `cursor`: the writable block file used by `flat_file`

pub mod cursor;
mod flat_file;
mod memory;
#[cfg(test)]
mod tests;

pub use flat_file::FileBlockStore;
pub use memory::MemoryBlockStore;

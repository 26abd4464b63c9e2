//! # Adapters Layer
//!
//! - `memory_chain`: in-memory [`ChainClient`](crate::ports::ChainClient)
//!   for tests and ephemeral nodes

pub mod memory_chain;

pub use memory_chain::MemoryChain;

//! # Shared Types Crate
//!
//! Chain primitives shared by the block store and the indexers.
//!
//! ## Design Principles
//!
//! - **Consumed, not validated**: blocks and transactions arrive already
//!   validated from the chain collaborator. Nothing here enforces consensus.
//! - **Canonical encoding**: every hash is computed over the `bincode`
//!   encoding of the value, so equal values always hash equally.
//! - **Fixed-width keys**: addresses are reduced to a 32-byte hash so index
//!   keys stay fixed width.

pub mod address;
pub mod coins;
pub mod entities;
pub mod errors;

pub use address::{Address, AddressKind};
pub use coins::{Coin, CoinView};
pub use entities::*;
pub use errors::*;

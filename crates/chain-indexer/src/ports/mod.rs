//! # Ports Layer
//!
//! - `inbound`: what a concrete index contributes per block
//! - `outbound`: the chain collaborator the indexers read from

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;

//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (block store API)
//! - `outbound.rs` - Driven ports (metadata key-value engine)

pub mod inbound;
pub mod outbound;

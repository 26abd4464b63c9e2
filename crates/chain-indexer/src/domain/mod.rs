//! # Domain Layer
//!
//! Pure index logic: key layout, sync state, TX metadata and compact filters.

pub mod config;
pub mod errors;
pub mod gcs;
pub mod layout;
pub mod state;
pub mod txmeta;

pub use config::*;
pub use errors::*;
pub use gcs::{chain_header, GcsFilter, GCS_FPR, GCS_M, GOLOMB_P};
pub use state::*;
pub use txmeta::*;

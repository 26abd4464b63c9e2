//! # Error Types
//!
//! Errors raised while decoding shared primitives.

use thiserror::Error;

/// Failure to decode a primitive from its canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Encoded bytes could not be parsed.
    #[error("Malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },

    /// Fixed-width value had the wrong length.
    #[error("Invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    pub(crate) fn malformed(what: &'static str, err: bincode::Error) -> Self {
        DecodeError::Malformed {
            what,
            message: err.to_string(),
        }
    }
}

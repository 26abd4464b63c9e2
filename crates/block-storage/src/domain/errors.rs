//! # Domain Errors
//!
//! Error types for the Block Storage subsystem.
//!
//! ## Design Principles
//!
//! - Corruption is always an error, never a silent skip or a retry
//! - Absent data is `Ok(None)` / `Ok(false)`, not an error
//! - Disk errors propagate unchanged to the caller

use shared_types::{short_hex, Hash};
use std::io;
use thiserror::Error;

/// Errors that can occur during block storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Stored checksum does not match the payload (record corrupted).
    #[error("Checksum mismatch in file {file} at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        file: u32,
        offset: u32,
        expected: u32,
        actual: u32,
    },

    /// Record header does not carry the configured magic.
    #[error("Bad record magic in file {file} at offset {offset}: {found:#010x}")]
    BadMagic { file: u32, offset: u32, found: u32 },

    /// Record header length disagrees with the indexed location.
    #[error("Record length mismatch in file {file} at offset {offset}: header says {header}, location says {location}")]
    LengthMismatch {
        file: u32,
        offset: u32,
        header: u32,
        location: u32,
    },

    /// Read extends past the known end of the file.
    #[error("Read out of bounds: file {file}, offset {offset}, length {length}, file size {file_size}")]
    OutOfBounds {
        file: u32,
        offset: u32,
        length: u32,
        file_size: u64,
    },

    /// Indexed location points at a file that no longer exists.
    #[error("Block file {file} is missing")]
    MissingFile { file: u32 },

    /// Payload exceeds the configured maximum record size.
    #[error("Record too large: {size} bytes, max {max_size} bytes")]
    RecordTooLarge { size: usize, max_size: usize },

    /// Configuration cannot be used.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Stored metadata value could not be decoded.
    #[error("Corrupt metadata for key {key}: {reason}")]
    CorruptMetadata { key: String, reason: String },

    /// Operation attempted after `close()`.
    #[error("Block store is closed")]
    Closed,

    /// Blocks directory is locked by another process.
    #[error(transparent)]
    Locked(#[from] crate::adapters::lock::LockError),

    /// Metadata key-value store failure.
    #[error(transparent)]
    KVStore(#[from] KVStoreError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Whether this error signals on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::ChecksumMismatch { .. }
                | StorageError::BadMagic { .. }
                | StorageError::LengthMismatch { .. }
                | StorageError::OutOfBounds { .. }
                | StorageError::CorruptMetadata { .. }
        )
    }

    pub(crate) fn corrupt_location(hash: &Hash, reason: impl Into<String>) -> Self {
        StorageError::CorruptMetadata {
            key: short_hex(hash),
            reason: reason.into(),
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl From<io::Error> for KVStoreError {
    fn from(err: io::Error) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::ChecksumMismatch {
            file: 3,
            offset: 120,
            expected: 0xdeadbeef,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("Checksum mismatch"));
        assert!(msg.contains("0xdeadbeef"));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_kv_error_conversion() {
        let kv_err = KVStoreError::IOError {
            message: "disk failure".to_string(),
        };
        let storage_err: StorageError = kv_err.into();

        match storage_err {
            StorageError::KVStore(KVStoreError::IOError { message }) => {
                assert!(message.contains("disk failure"));
            }
            _ => panic!("Expected KVStore error"),
        }
    }

    #[test]
    fn test_resource_errors_are_not_corruption() {
        let err = StorageError::RecordTooLarge {
            size: 10,
            max_size: 5,
        };
        assert!(!err.is_corruption());
    }
}

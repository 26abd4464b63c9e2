//! # Block Store Configuration
//!
//! All values have production defaults; tests shrink the file ceiling to
//! exercise rotation without writing hundreds of megabytes.

use std::time::Duration;

use crate::domain::errors::StorageError;
use crate::domain::record::FRAME_OVERHEAD;

/// Default block file size ceiling (512 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u32 = 512 << 20;

/// Default bound on simultaneously open file handles.
pub const DEFAULT_MAX_OPEN_FILES: usize = 64;

/// Default largest accepted block payload (12 MiB).
pub const DEFAULT_MAX_RECORD_SIZE: usize = 12 << 20;

/// Default record magic (mainnet network magic, little-endian on disk).
pub const DEFAULT_MAGIC: u32 = 0xd9b4_bef9;

/// Configuration for the flat-file block store.
#[derive(Debug, Clone)]
pub struct BlockStoreConfig {
    /// Size ceiling of one block file. A write that would cross it rolls
    /// over to the next file first.
    pub max_file_size: u32,

    /// Open handle bound, including the current write handle.
    pub max_open_files: usize,

    /// Largest payload accepted by `write_block`.
    pub max_record_size: usize,

    /// Magic stamped at the start of every framed record.
    pub magic: u32,

    /// fsync the current file after every write.
    pub sync_writes: bool,

    /// Number of writes buffered before the metadata buffer is committed.
    pub commit_interval: usize,

    /// How long `open` waits for another process to release the directory.
    pub lock_timeout: Duration,
}

impl Default for BlockStoreConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            magic: DEFAULT_MAGIC,
            sync_writes: true,
            commit_interval: 1,
            lock_timeout: Duration::from_secs(30),
        }
    }
}

impl BlockStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block file size ceiling.
    pub fn with_max_file_size(mut self, size: u32) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set the open handle bound.
    pub fn with_max_open_files(mut self, count: usize) -> Self {
        self.max_open_files = count;
        self
    }

    /// Set the largest accepted payload.
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Set the record magic.
    pub fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Enable or disable fsync after every write.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Set how many writes are buffered between metadata commits.
    pub fn with_commit_interval(mut self, interval: usize) -> Self {
        self.commit_interval = interval;
        self
    }

    /// Set the directory lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Reject configurations the store cannot operate under.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.max_open_files < 2 {
            return Err(invalid("max_open_files must allow one write and one read handle"));
        }
        if self.commit_interval == 0 {
            return Err(invalid("commit_interval must be at least 1"));
        }
        if self.max_record_size == 0 {
            return Err(invalid("max_record_size must be non-zero"));
        }
        let largest_frame = self.max_record_size as u64 + FRAME_OVERHEAD as u64;
        if largest_frame > self.max_file_size as u64 {
            return Err(invalid(format!(
                "max_file_size {} cannot hold a {} byte record",
                self.max_file_size, self.max_record_size
            )));
        }
        Ok(())
    }

    /// Open read handles, keeping one slot for the write handle.
    pub(crate) fn read_handle_capacity(&self) -> usize {
        self.max_open_files.saturating_sub(1).max(1)
    }
}

fn invalid(reason: impl Into<String>) -> StorageError {
    StorageError::InvalidConfig {
        reason: reason.into(),
    }
}

//! # File Cursor
//!
//! The single writable block file. `offset` always equals the file's true
//! end: it advances only after a frame is fully written, and a failed
//! append truncates whatever partial bytes reached the disk.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Extension of block files.
pub const BLOCK_FILE_EXT: &str = "fdb";

/// `dir/NNNNNNNNNN.fdb`
pub fn block_file_path(dir: &Path, file_index: u32) -> PathBuf {
    dir.join(format!("{:010}.{}", file_index, BLOCK_FILE_EXT))
}

/// Parse a block file name back into its index.
pub fn parse_block_file_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(BLOCK_FILE_EXT)?.strip_suffix('.')?;
    if stem.len() != 10 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

pub(crate) struct FileCursor {
    file_index: u32,
    offset: u32,
    handle: File,
}

impl FileCursor {
    /// Open (or create) `file_index`, positioned at its end.
    pub(crate) async fn open(dir: &Path, file_index: u32) -> std::io::Result<Self> {
        let path = block_file_path(dir, file_index);
        let handle = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .await?;
        let len = handle.metadata().await?.len();
        let offset = u32::try_from(len).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("block file {} exceeds 4 GiB", path.display()),
            )
        })?;

        Ok(Self {
            file_index,
            offset,
            handle,
        })
    }

    pub(crate) fn file_index(&self) -> u32 {
        self.file_index
    }

    pub(crate) fn offset(&self) -> u32 {
        self.offset
    }

    /// Append `frame` at the current offset and return where it starts.
    pub(crate) async fn append(&mut self, frame: &[u8]) -> std::io::Result<u32> {
        let start = self.offset;
        match self.write_at(start, frame).await {
            Ok(()) => {
                self.offset = start + frame.len() as u32;
                Ok(start)
            }
            Err(err) => {
                let _ = self.handle.set_len(start as u64).await;
                Err(err)
            }
        }
    }

    async fn write_at(&mut self, offset: u32, frame: &[u8]) -> std::io::Result<()> {
        self.handle.seek(SeekFrom::Start(offset as u64)).await?;
        self.handle.write_all(frame).await?;
        self.handle.flush().await
    }

    /// fsync the file's data.
    pub(crate) async fn sync(&mut self) -> std::io::Result<()> {
        self.handle.sync_data().await
    }
}

//! # Location Records
//!
//! Fixed-width little-endian values stored in the metadata index.

use crate::domain::errors::KVStoreError;

/// Where a block's framed record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLocation {
    /// Block file index.
    pub file: u32,
    /// Offset of the frame's first byte.
    pub offset: u32,
    /// Frame length (payload plus framing).
    pub length: u32,
}

impl BlockLocation {
    pub const SIZE: usize = 12;

    pub fn new(file: u32, offset: u32, length: u32) -> Self {
        Self {
            file,
            offset,
            length,
        }
    }

    /// Offset one past the frame's last byte.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.file.to_le_bytes());
        buf[4..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, KVStoreError> {
        let [file, offset, length] = read_fields::<3>(data, "block location")?;
        Ok(Self::new(file, offset, length))
    }
}

/// Per-file accounting, updated on every write and prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileRecord {
    /// Live blocks in the file.
    pub blocks: u32,
    /// Bytes belonging to live blocks.
    pub used: u32,
    /// Bytes appended to the file so far.
    pub length: u32,
}

impl FileRecord {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.blocks.to_le_bytes());
        buf[4..8].copy_from_slice(&self.used.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, KVStoreError> {
        let [blocks, used, length] = read_fields::<3>(data, "file record")?;
        Ok(Self {
            blocks,
            used,
            length,
        })
    }

    /// Account for a newly appended frame.
    pub fn add_block(&mut self, location: &BlockLocation) {
        self.blocks += 1;
        self.used += location.length;
        self.length = self.length.max(location.offset + location.length);
    }

    /// Account for a pruned frame.
    pub fn remove_block(&mut self, location: &BlockLocation) {
        self.blocks = self.blocks.saturating_sub(1);
        self.used = self.used.saturating_sub(location.length);
    }
}

fn read_fields<const N: usize>(data: &[u8], what: &str) -> Result<[u32; N], KVStoreError> {
    if data.len() != N * 4 {
        return Err(KVStoreError::CorruptionError {
            message: format!("{what}: expected {} bytes, got {}", N * 4, data.len()),
        });
    }
    let mut fields = [0u32; N];
    for (field, chunk) in fields.iter_mut().zip(data.chunks_exact(4)) {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(chunk);
        *field = u32::from_le_bytes(buf);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_layout() {
        let location = BlockLocation::new(1, 0x0203, 0x40);
        let bytes = location.to_bytes();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x03, 0x02, 0, 0]);
        assert_eq!(BlockLocation::from_bytes(&bytes).unwrap(), location);
        assert_eq!(location.end(), 0x0243);
    }

    #[test]
    fn test_short_location_is_corruption() {
        assert!(matches!(
            BlockLocation::from_bytes(&[0u8; 11]),
            Err(KVStoreError::CorruptionError { .. })
        ));
    }

    #[test]
    fn test_file_record_accounting() {
        let mut record = FileRecord::default();
        let first = BlockLocation::new(0, 0, 100);
        let second = BlockLocation::new(0, 100, 50);

        record.add_block(&first);
        record.add_block(&second);
        assert_eq!(record.blocks, 2);
        assert_eq!(record.used, 150);
        assert_eq!(record.length, 150);

        record.remove_block(&first);
        assert_eq!(record.blocks, 1);
        assert_eq!(record.used, 50);
        assert_eq!(record.length, 150);

        let decoded = FileRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(decoded, record);
    }
}

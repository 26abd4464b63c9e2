//! # Metadata Key Layout
//!
//! Every key starts with a one-byte type prefix followed by fixed-width
//! fields, so a range scan over one prefix never crosses into another.

use shared_types::Hash;

/// Key prefixes for the block store's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Block location: `b[hash]` -> BlockLocation
    Block,
    /// File accounting: `f[file u32 BE]` -> FileRecord
    File,
}

impl KeyPrefix {
    pub fn as_byte(&self) -> u8 {
        match self {
            KeyPrefix::Block => b'b',
            KeyPrefix::File => b'f',
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(self.as_byte());
        key.extend_from_slice(suffix);
        key
    }

    /// Build a block location key from a hash.
    pub fn block_key(hash: &Hash) -> Vec<u8> {
        KeyPrefix::Block.key(hash)
    }

    /// Build a file record key. Big-endian so files scan in index order.
    pub fn file_key(file: u32) -> Vec<u8> {
        KeyPrefix::File.key(&file.to_be_bytes())
    }

    /// File index of an `f` key.
    pub fn parse_file_key(key: &[u8]) -> Option<u32> {
        match key {
            [prefix, index @ ..] if *prefix == KeyPrefix::File.as_byte() => {
                Some(u32::from_be_bytes(index.try_into().ok()?))
            }
            _ => None,
        }
    }
}

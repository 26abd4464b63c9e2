use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{scan_btree, BatchOperation, KeyValueStore, ScanOptions, ScanResult};

/// File-backed key-value store for deployments without RocksDB.
///
/// Holds the whole map in memory and rewrites a snapshot file on every
/// mutation (temp file, fsync, rename), so the file on disk is always a
/// complete batch boundary. Suitable for development and light nodes.
pub struct FileBackedKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading an existing snapshot if present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let data = Self::load_from_file(&path)?;
            tracing::info!(
                "[block-store] 💾 Loaded {} metadata keys from {}",
                data.len(),
                path.display()
            );
            data
        } else {
            tracing::info!("[block-store] 📁 No metadata file at {}", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot format: `[key_len u32 LE][key][value_len u32 LE][value]...`
    fn load_from_file(path: &Path) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, KVStoreError> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;

        let mut data = BTreeMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let key = Self::read_chunk(&bytes, &mut cursor)?;
            let value = Self::read_chunk(&bytes, &mut cursor)?;
            data.insert(key, value);
        }
        Ok(data)
    }

    fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>, KVStoreError> {
        let truncated = || KVStoreError::CorruptionError {
            message: format!("metadata snapshot truncated at byte {}", cursor),
        };
        let header = bytes.get(*cursor..*cursor + 4).ok_or_else(truncated)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let start = *cursor + 4;
        let chunk = bytes.get(start..start + len).ok_or_else(truncated)?;
        *cursor = start + len;
        Ok(chunk.to_vec())
    }

    fn save_to_file(&self, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Apply `operations` to a copy and persist it before publishing, so a
    /// failed write leaves memory and disk unchanged.
    fn apply(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    next.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    next.remove(&key);
                }
            }
        }
        self.save_to_file(&next)?;
        *data = next;
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.apply(vec![BatchOperation::put(key, value)])
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.apply(vec![BatchOperation::delete(key)])
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.apply(operations)
    }

    fn scan(&self, options: &ScanOptions) -> Result<ScanResult, KVStoreError> {
        Ok(scan_btree(&self.data.read(), options))
    }
}

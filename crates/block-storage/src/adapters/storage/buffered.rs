use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::domain::errors::KVStoreError;
use crate::domain::treap::Treap;
use crate::ports::outbound::{scan_btree, BatchOperation, KeyValueStore, ScanOptions, ScanResult};

#[derive(Clone, Default)]
struct PendingWrites {
    /// Pending inserts.
    add: Treap<Vec<u8>, Vec<u8>>,
    /// Pending removals.
    del: Treap<Vec<u8>, ()>,
}

/// Write buffer in front of a durable key-value store.
///
/// Puts and deletes land in two in-memory treaps and are visible to reads
/// immediately. [`PendingWriteStore::commit`] drains them into the inner
/// store as one atomic batch; until then the inner store is untouched.
pub struct PendingWriteStore<S> {
    inner: S,
    pending: Mutex<PendingWrites>,
}

impl<S: KeyValueStore> PendingWriteStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: Mutex::new(PendingWrites::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of buffered operations.
    pub fn pending_len(&self) -> usize {
        let pending = self.pending.lock();
        pending.add.len() + pending.del.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_len() > 0
    }

    /// Flush buffered writes to the inner store in one atomic batch.
    ///
    /// Iterates a snapshot of the buffers, so writes buffered while the
    /// batch is in flight stay pending. On failure nothing is dropped.
    /// Returns the number of operations committed.
    pub fn commit(&self) -> Result<usize, KVStoreError> {
        let snapshot = self.pending.lock().clone();
        if snapshot.add.is_empty() && snapshot.del.is_empty() {
            return Ok(0);
        }

        let mut batch = Vec::with_capacity(snapshot.add.len() + snapshot.del.len());
        for (key, _) in snapshot.del.iter() {
            // A key in both trees was re-added after deletion.
            if !snapshot.add.contains(key) {
                batch.push(BatchOperation::delete(key.clone()));
            }
        }
        for (key, value) in snapshot.add.iter() {
            batch.push(BatchOperation::put(key.clone(), value.clone()));
        }

        let count = batch.len();
        self.inner.atomic_batch_write(batch)?;

        let mut pending = self.pending.lock();
        for (key, value) in snapshot.add.iter() {
            if pending.add.search(key) == Some(value) {
                pending.add.remove(key);
            }
        }
        for (key, _) in snapshot.del.iter() {
            pending.del.remove(key);
        }

        Ok(count)
    }

    /// Drop every buffered write.
    pub fn discard(&self) {
        let mut pending = self.pending.lock();
        pending.add.reset();
        pending.del.reset();
    }
}

impl<S: KeyValueStore> KeyValueStore for PendingWriteStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        {
            let pending = self.pending.lock();
            let key = key.to_vec();
            if let Some(value) = pending.add.search(&key) {
                return Ok(Some(value.clone()));
            }
            if pending.del.contains(&key) {
                return Ok(None);
            }
        }
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let mut pending = self.pending.lock();
        pending.del.remove(&key.to_vec());
        pending.add.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let mut pending = self.pending.lock();
        pending.add.remove(&key.to_vec());
        pending.del.insert(key.to_vec(), ());
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut pending = self.pending.lock();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    pending.del.remove(&key);
                    pending.add.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    pending.add.remove(&key);
                    pending.del.insert(key, ());
                }
            }
        }
        Ok(())
    }

    fn scan(&self, options: &ScanOptions) -> Result<ScanResult, KVStoreError> {
        if options.is_empty_range() {
            return Ok(Vec::new());
        }

        let pending = self.pending.lock().clone();
        let unbounded = ScanOptions {
            limit: None,
            reverse: false,
            ..options.clone()
        };
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.inner.scan(&unbounded)?.into_iter().collect();

        for (key, _) in pending.del.iter() {
            merged.remove(key);
        }
        for (key, value) in pending.add.iter() {
            if options.contains(key) {
                merged.insert(key.clone(), value.clone());
            }
        }

        Ok(scan_btree(&merged, options))
    }
}

//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the block store and the indexers.
//!
//! The metadata key-value engine is consumed, not implemented, by this
//! layer. Adapters in `crate::adapters::storage` cover tests, light
//! deployments and (behind the `rocksdb` feature) production.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::domain::errors::KVStoreError;

/// Key/value pairs returned by a scan.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Longest key a prefix scan is guaranteed to cover.
pub const MAX_KEY_SIZE: usize = 128;

/// Abstract interface for key-value database operations.
///
/// Methods take `&self`; implementations synchronize internally so one
/// store can be shared between the block store and every indexer.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Ordered range iteration.
    fn scan(&self, options: &ScanOptions) -> Result<ScanResult, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Every entry whose key starts with `prefix`, ascending.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.scan(&ScanOptions::prefix(prefix))
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        (**self).delete(key)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        (**self).atomic_batch_write(operations)
    }

    fn scan(&self, options: &ScanOptions) -> Result<ScanResult, KVStoreError> {
        (**self).scan(options)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key)
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

/// Range iteration options. Both bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub gte: Option<Vec<u8>>,
    pub lte: Option<Vec<u8>>,
    /// Walk from `lte` down to `gte`.
    pub reverse: bool,
    /// Stop after this many entries.
    pub limit: Option<usize>,
}

impl ScanOptions {
    /// All keys between `gte` and `lte`, inclusive.
    pub fn range(gte: impl Into<Vec<u8>>, lte: impl Into<Vec<u8>>) -> Self {
        Self {
            gte: Some(gte.into()),
            lte: Some(lte.into()),
            ..Default::default()
        }
    }

    /// All keys starting with `prefix` (up to [`MAX_KEY_SIZE`] bytes long).
    pub fn prefix(prefix: &[u8]) -> Self {
        let mut lte = prefix.to_vec();
        lte.resize(MAX_KEY_SIZE.max(prefix.len()), 0xff);
        Self::range(prefix, lte)
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `key` lies within the bounds.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.gte.as_deref().map_or(true, |gte| key >= gte)
            && self.lte.as_deref().map_or(true, |lte| key <= lte)
    }

    /// Whether the bounds can match nothing.
    pub fn is_empty_range(&self) -> bool {
        matches!((&self.gte, &self.lte), (Some(gte), Some(lte)) if gte > lte)
            || self.limit == Some(0)
    }

    fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        let lower = self.gte.as_deref().map_or(Bound::Unbounded, Bound::Included);
        let upper = self.lte.as_deref().map_or(Bound::Unbounded, Bound::Included);
        (lower, upper)
    }
}

/// Scan an ordered map according to `options`.
pub(crate) fn scan_btree(map: &BTreeMap<Vec<u8>, Vec<u8>>, options: &ScanOptions) -> ScanResult {
    if options.is_empty_range() {
        return Vec::new();
    }
    let limit = options.limit.unwrap_or(usize::MAX);
    let range = map.range::<[u8], _>(options.bounds());
    let clone = |(k, v): (&Vec<u8>, &Vec<u8>)| (k.clone(), v.clone());
    if options.reverse {
        range.rev().take(limit).map(clone).collect()
    } else {
        range.take(limit).map(clone).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<Vec<u8>, Vec<u8>> {
        [b"a1", b"a2", b"a3", b"b1"]
            .iter()
            .map(|k| (k.to_vec(), vec![]))
            .collect()
    }

    fn keys(result: ScanResult) -> Vec<Vec<u8>> {
        result.into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_prefix_scan_stays_in_prefix() {
        let got = keys(scan_btree(&sample(), &ScanOptions::prefix(b"a")));
        assert_eq!(got, vec![b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec()]);
    }

    #[test]
    fn test_reverse_with_limit() {
        let options = ScanOptions::prefix(b"a").reverse(true).limit(2);
        let got = keys(scan_btree(&sample(), &options));
        assert_eq!(got, vec![b"a3".to_vec(), b"a2".to_vec()]);
    }

    #[test]
    fn test_inverted_bounds_are_empty() {
        let options = ScanOptions::range(b"b".to_vec(), b"a".to_vec());
        assert!(options.is_empty_range());
        assert!(scan_btree(&sample(), &options).is_empty());
    }

    #[test]
    fn test_inclusive_bounds() {
        let options = ScanOptions::range(b"a2".to_vec(), b"b1".to_vec());
        let got = keys(scan_btree(&sample(), &options));
        assert_eq!(got, vec![b"a2".to_vec(), b"a3".to_vec(), b"b1".to_vec()]);
        assert!(options.contains(b"a2"));
        assert!(!options.contains(b"a1"));
    }
}

//! # Block Store Service Tests

use super::*;
use crate::adapters::storage::InMemoryKVStore;
use crate::domain::config::BlockStoreConfig;
use crate::domain::errors::StorageError;
use crate::domain::layout::KeyPrefix;
use crate::domain::location::BlockLocation;
use crate::domain::record::FRAME_OVERHEAD;
use crate::ports::inbound::BlockStore;
use crate::ports::outbound::KeyValueStore;
use shared_types::{sha256d, Hash};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type TestStore = FileBlockStore<Arc<InMemoryKVStore>>;

fn small_config() -> BlockStoreConfig {
    BlockStoreConfig::new()
        .with_max_file_size(1024)
        .with_max_record_size(256)
        .with_lock_timeout(Duration::from_millis(100))
}

async fn open_store(dir: &Path, config: BlockStoreConfig, meta: &Arc<InMemoryKVStore>) -> TestStore {
    FileBlockStore::open(dir, config, meta.clone()).await.unwrap()
}

fn payload(tag: u8, len: usize) -> (Hash, Vec<u8>) {
    let data = vec![tag; len];
    (sha256d(&[tag, len as u8]), data)
}

fn flip_byte(path: &Path, offset: u64) {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    let bytes = std::fs::read(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[bytes[offset as usize] ^ 0x80]).unwrap();
    file.sync_all().unwrap();
}

#[tokio::test]
async fn test_write_and_read_block() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(1, 100);
    let location = store.write_block(&hash, &data).await.unwrap();
    assert_eq!(location, BlockLocation::new(0, 0, 100 + FRAME_OVERHEAD as u32));

    assert_eq!(store.read_block(&hash).await.unwrap(), Some(data));
    assert!(store.has(&hash).await.unwrap());
    assert!(meta.exists(&KeyPrefix::block_key(&hash)).unwrap());
}

#[tokio::test]
async fn test_unknown_hash_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    assert_eq!(store.read_block(&[9; 32]).await.unwrap(), None);
    assert!(!store.has(&[9; 32]).await.unwrap());
    assert!(!store.prune_block(&[9; 32]).await.unwrap());
}

#[tokio::test]
async fn test_rewrite_returns_existing_location() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(1, 10);
    let first = store.write_block(&hash, &data).await.unwrap();
    let second = store.write_block(&hash, &data).await.unwrap();
    assert_eq!(first, second);

    let record = store.file_record(0).await.unwrap().unwrap();
    assert_eq!(record.blocks, 1);
    assert_eq!(record.length, first.length);
}

#[tokio::test]
async fn test_record_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(1, 257);
    assert!(matches!(
        store.write_block(&hash, &data).await,
        Err(StorageError::RecordTooLarge { size: 257, max_size: 256 })
    ));
    assert!(!store.has(&hash).await.unwrap());
}

#[tokio::test]
async fn test_rotation_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    // 112-byte frames: nine fit in 1024 bytes, the tenth does not.
    let mut written = Vec::new();
    for tag in 0..10u8 {
        let (hash, data) = payload(tag, 100);
        let location = store.write_block(&hash, &data).await.unwrap();
        written.push((hash, data, location));
    }

    for (i, (_, _, location)) in written.iter().take(9).enumerate() {
        assert_eq!(location.file, 0);
        assert_eq!(location.offset, i as u32 * 112);
    }
    assert_eq!(written[9].2, BlockLocation::new(1, 0, 112));
    assert_eq!(store.current_file().await.unwrap(), 1);
    assert_eq!(std::fs::metadata(store.file_path(0)).unwrap().len(), 9 * 112);

    for (hash, data, _) in &written {
        assert_eq!(store.read_block(hash).await.unwrap().as_ref(), Some(data));
    }
}

#[tokio::test]
async fn test_payload_corruption_detected() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(7, 64);
    let location = store.write_block(&hash, &data).await.unwrap();
    flip_byte(&store.file_path(0), location.offset as u64 + 8 + 10);

    let err = store.read_block(&hash).await.unwrap_err();
    assert!(matches!(err, StorageError::ChecksumMismatch { file: 0, .. }));
}

#[tokio::test]
async fn test_checksum_corruption_detected() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(7, 64);
    let location = store.write_block(&hash, &data).await.unwrap();
    flip_byte(&store.file_path(0), location.end() - 1);

    assert!(store.read_block(&hash).await.unwrap_err().is_corruption());
}

#[tokio::test]
async fn test_out_of_bounds_location() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let (hash, data) = payload(1, 10);
    store.write_block(&hash, &data).await.unwrap();

    let bogus: Hash = [0xee; 32];
    meta.put(
        &KeyPrefix::block_key(&bogus),
        &BlockLocation::new(0, 0, 500).to_bytes(),
    )
    .unwrap();

    assert!(matches!(
        store.read_block(&bogus).await,
        Err(StorageError::OutOfBounds { file_size: 22, .. })
    ));
}

#[tokio::test]
async fn test_reopen_resumes_current_file() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());

    let (h1, d1) = payload(1, 100);
    let (h2, d2) = payload(2, 100);
    {
        let store = open_store(dir.path(), small_config(), &meta).await;
        store.write_block(&h1, &d1).await.unwrap();
        store.close().await.unwrap();
    }

    let store = open_store(dir.path(), small_config(), &meta).await;
    assert_eq!(store.read_block(&h1).await.unwrap(), Some(d1));
    let location = store.write_block(&h2, &d2).await.unwrap();
    assert_eq!(location, BlockLocation::new(0, 112, 112));
}

#[tokio::test]
async fn test_uncommitted_pointers_lost_on_crash() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let config = small_config().with_commit_interval(10);

    let (hash, data) = payload(1, 100);
    {
        let store = open_store(dir.path(), config.clone(), &meta).await;
        store.write_block(&hash, &data).await.unwrap();
        assert!(store.has(&hash).await.unwrap());
        assert!(!meta.exists(&KeyPrefix::block_key(&hash)).unwrap());
        // Dropped without close.
    }

    let store = open_store(dir.path(), config, &meta).await;
    assert_eq!(store.read_block(&hash).await.unwrap(), None);

    // The orphaned tail is skipped, not overwritten.
    let location = store.write_block(&hash, &data).await.unwrap();
    assert_eq!(location.offset, 112);
    store.flush().await.unwrap();
    assert!(meta.exists(&KeyPrefix::block_key(&hash)).unwrap());
}

#[tokio::test]
async fn test_prune_removes_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let mut hashes = Vec::new();
    for tag in 0..10u8 {
        let (hash, data) = payload(tag, 100);
        store.write_block(&hash, &data).await.unwrap();
        hashes.push(hash);
    }
    let old_file = store.file_path(0);

    for hash in &hashes[..8] {
        assert!(store.prune_block(hash).await.unwrap());
    }
    assert!(old_file.exists());
    assert_eq!(store.file_record(0).await.unwrap().unwrap().blocks, 1);

    assert!(store.prune_block(&hashes[8]).await.unwrap());
    assert!(!old_file.exists());
    assert_eq!(store.file_record(0).await.unwrap(), None);
    assert!(!store.prune_block(&hashes[8]).await.unwrap());

    // Current file is kept even when emptied.
    assert!(store.prune_block(&hashes[9]).await.unwrap());
    assert!(store.file_path(1).exists());
    assert_eq!(store.file_record(1).await.unwrap().unwrap().blocks, 0);
}

/// Four 200-byte blocks fill file 0 of `small_config`.
async fn fill_and_empty_first_file(store: &TestStore) {
    let mut hashes = Vec::new();
    for tag in 0..4u8 {
        let (hash, data) = payload(tag, 200);
        assert_eq!(store.write_block(&hash, &data).await.unwrap().file, 0);
        hashes.push(hash);
    }
    for hash in &hashes {
        assert!(store.prune_block(hash).await.unwrap());
    }
}

#[tokio::test]
async fn test_file_emptied_while_current_reclaimed_on_rollover() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    fill_and_empty_first_file(&store).await;
    assert!(store.file_path(0).exists());
    assert_eq!(store.file_record(0).await.unwrap().unwrap().blocks, 0);

    let (hash, data) = payload(4, 200);
    let location = store.write_block(&hash, &data).await.unwrap();
    assert_eq!(location, BlockLocation::new(1, 0, 200 + FRAME_OVERHEAD as u32));
    assert_eq!(store.current_file().await.unwrap(), 1);

    assert!(!store.file_path(0).exists());
    assert_eq!(store.file_record(0).await.unwrap(), None);
    assert!(!meta.exists(&KeyPrefix::file_key(0)).unwrap());
    assert_eq!(store.read_block(&hash).await.unwrap(), Some(data));
}

#[tokio::test]
async fn test_reopen_reclaims_emptied_files() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());

    let next_file = {
        let store = open_store(dir.path(), small_config(), &meta).await;
        fill_and_empty_first_file(&store).await;
        store.close().await.unwrap();
        store.file_path(1)
    };
    // Stopped after the next file was created, before reclamation.
    std::fs::File::create(&next_file).unwrap();

    let store = open_store(dir.path(), small_config(), &meta).await;
    assert_eq!(store.current_file().await.unwrap(), 1);
    assert!(!store.file_path(0).exists());
    assert_eq!(store.file_record(0).await.unwrap(), None);
    assert!(!meta.exists(&KeyPrefix::file_key(0)).unwrap());
}

#[tokio::test]
async fn test_rollover_reopens_failed_next_file_as_old_writer() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let mut kept = Vec::new();
    for tag in 0..4u8 {
        let (hash, data) = payload(tag, 200);
        store.write_block(&hash, &data).await.unwrap();
        kept.push((hash, data));
    }
    // A directory where file 1 belongs makes opening it fail.
    std::fs::create_dir(store.file_path(1)).unwrap();

    let (hash, data) = payload(4, 200);
    assert!(matches!(store.write_block(&hash, &data).await, Err(StorageError::Io(_))));
    assert_eq!(store.current_file().await.unwrap(), 0);
    for (hash, data) in kept {
        assert_eq!(store.read_block(&hash).await.unwrap(), Some(data));
    }
}

#[tokio::test]
async fn test_read_handle_cache_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let config = small_config()
        .with_max_file_size(128)
        .with_max_record_size(100)
        .with_max_open_files(3);
    let store = open_store(dir.path(), config, &meta).await;

    let mut written = Vec::new();
    for tag in 0..5u8 {
        let (hash, data) = payload(tag, 100);
        let location = store.write_block(&hash, &data).await.unwrap();
        assert_eq!(location.file, tag as u32);
        written.push((hash, data));
    }

    for _ in 0..2 {
        for (hash, data) in &written {
            assert_eq!(store.read_block(hash).await.unwrap().as_ref(), Some(data));
            assert!(store.open_read_handles().await <= 2);
        }
    }
}

#[tokio::test]
async fn test_closed_store_rejects_operations() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;
    store.close().await.unwrap();
    store.close().await.unwrap();

    let (hash, data) = payload(1, 10);
    assert!(matches!(
        store.write_block(&hash, &data).await,
        Err(StorageError::Closed)
    ));
    assert!(matches!(store.read_block(&hash).await, Err(StorageError::Closed)));
}

#[tokio::test]
async fn test_directory_lock_excludes_second_store() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let store = open_store(dir.path(), small_config(), &meta).await;

    let second = FileBlockStore::open(dir.path(), small_config(), meta.clone()).await;
    assert!(matches!(second, Err(StorageError::Locked(_))));

    store.close().await.unwrap();
    let reopened = FileBlockStore::open(dir.path(), small_config(), meta.clone()).await;
    assert!(reopened.is_ok());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(InMemoryKVStore::new());
    let config = small_config().with_max_record_size(2048);

    assert!(matches!(
        FileBlockStore::open(dir.path(), config, meta).await,
        Err(StorageError::InvalidConfig { .. })
    ));
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryBlockStore::new(64);
    let (hash, data) = payload(3, 10);

    let location = store.write_block(&hash, &data).await.unwrap();
    assert_eq!(store.write_block(&hash, &data).await.unwrap(), location);
    assert_eq!(store.read_block(&hash).await.unwrap(), Some(data));
    assert_eq!(store.len(), 1);

    let (other, other_data) = payload(4, 10);
    let next = store.write_block(&other, &other_data).await.unwrap();
    assert_eq!(next.offset, location.end() as u32);

    assert!(store.prune_block(&hash).await.unwrap());
    assert!(!store.has(&hash).await.unwrap());
    assert!(matches!(
        store.write_block(&[0; 32], &[0; 65]).await,
        Err(StorageError::RecordTooLarge { .. })
    ));
}

//! Indexes over durable metadata files, alongside the flat-file block store.

use std::sync::Arc;
use std::time::Duration;

use block_storage::{BlockStore, BlockStoreConfig, FileBackedKVStore, FileBlockStore};
use chain_indexer::{
    AddrIndexer, AddressQuery, FilterIndexer, Indexer, IndexerConfig, MemoryChain, TxIndexer,
};
use shared_types::{Address, Block, BlockHeader, OutPoint, Transaction, TxInput, TxOutput};

fn miner() -> Address {
    Address::pubkey_hash([0x11; 20])
}

fn coinbase(height: u32) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            prevout: OutPoint::null(),
            script: height.to_le_bytes().to_vec(),
            sequence: u32::MAX,
        }],
        outputs: vec![
            TxOutput::new(50, miner().to_script()),
            TxOutput::new(0, vec![0x6a, 0x04, 1, 2, 3, 4]),
        ],
        locktime: 0,
    }
}

fn build_chain(height: u32) -> Arc<MemoryChain> {
    let genesis = Block {
        header: BlockHeader {
            version: 1,
            time: 1_231_006_505,
            ..Default::default()
        },
        transactions: vec![coinbase(0)],
    };
    let chain = MemoryChain::new(genesis);
    while chain.height() < height {
        let parent = chain.tip();
        let block = MemoryChain::child_block(&parent, vec![coinbase(parent.height + 1)], 0);
        chain.add_block(block).unwrap();
    }
    Arc::new(chain)
}

#[tokio::test]
async fn durable_indexes_resume_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let tx_path = dir.path().join("tx.kv");
    let addr_path = dir.path().join("addr.kv");

    let chain = build_chain(6);
    {
        let tx_index = Indexer::new(
            TxIndexer,
            FileBackedKVStore::open(&tx_path).unwrap(),
            chain.clone(),
            IndexerConfig::new("tx"),
        );
        tx_index.open().await.unwrap();
        assert_eq!(tx_index.height(), Some(6));
        tx_index.close().await.unwrap();
    }

    let tx_index = Indexer::new(
        TxIndexer,
        FileBackedKVStore::open(&tx_path).unwrap(),
        chain.clone(),
        IndexerConfig::new("tx"),
    );
    tx_index.open().await.unwrap();
    assert_eq!(tx_index.height(), Some(6));
    let meta = tx_index.get_meta(&coinbase(3).hash()).unwrap().unwrap();
    assert_eq!(meta.height, 3);

    let addr_index = Indexer::new(
        AddrIndexer,
        FileBackedKVStore::open(&addr_path).unwrap(),
        chain.clone(),
        IndexerConfig::new("addr").with_max_address_results(4),
    );
    addr_index.open().await.unwrap();

    let mut pages = Vec::new();
    let mut query = AddressQuery::new().limit(4);
    loop {
        let page = addr_index.get_hashes_by_address(&miner(), query).unwrap();
        if page.is_empty() {
            break;
        }
        query = query.after(page[page.len() - 1]);
        pages.extend(page);
    }
    let expected: Vec<_> = (0..=6).map(|h| coinbase(h).hash()).collect();
    assert_eq!(pages, expected);
}

#[tokio::test]
async fn indexed_blocks_resolve_through_block_store() {
    let dir = tempfile::tempdir().unwrap();
    let chain = build_chain(5);

    let blocks = FileBlockStore::open(
        dir.path().join("blocks"),
        BlockStoreConfig::new().with_lock_timeout(Duration::from_millis(100)),
        FileBackedKVStore::open(dir.path().join("blocks.kv")).unwrap(),
    )
    .await
    .unwrap();
    for height in 0..=5 {
        let entry = chain.entry_at(height).unwrap();
        let block = chain.block(&entry.hash).unwrap();
        blocks.write_block(&entry.hash, &block.to_bytes()).await.unwrap();
    }

    let tx_index = Indexer::new(
        TxIndexer,
        FileBackedKVStore::open(dir.path().join("tx.kv")).unwrap(),
        chain.clone(),
        IndexerConfig::new("tx"),
    );
    tx_index.open().await.unwrap();

    let tx = coinbase(4);
    let meta = tx_index.get_meta(&tx.hash()).unwrap().unwrap();
    let raw = blocks.read_block(&meta.block).await.unwrap().unwrap();
    let block = Block::from_bytes(&raw).unwrap();
    assert_eq!(block.transactions[meta.index as usize], tx);
}

#[tokio::test]
async fn filters_skip_unspendable_outputs() {
    let chain = build_chain(2);
    let filter_index = Indexer::new(
        FilterIndexer,
        Arc::new(block_storage::InMemoryKVStore::new()),
        chain.clone(),
        IndexerConfig::new("filter"),
    );
    filter_index.open().await.unwrap();

    let entry = chain.entry_at(2).unwrap();
    let filter = filter_index.get_filter(&entry.hash).unwrap().unwrap();
    assert_eq!(filter.n, 1);
    assert!(filter.match_one(&miner().to_script()).unwrap());
    assert!(!filter
        .match_one(&[0x6a, 0x04, 1, 2, 3, 4])
        .unwrap());
}

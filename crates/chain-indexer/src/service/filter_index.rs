//! # Filter Index
//!
//! `g[block]` holds the block's basic compact filter and `G[block]` its
//! filter header. Headers form a hash chain seeded with the all-zero hash
//! as genesis's predecessor, so a block can only be indexed once its
//! parent's header exists.

use block_storage::{BatchOperation, KeyValueStore};
use shared_types::{Block, ChainEntry, CoinView, Hash, OP_RETURN, ZERO_HASH};

use crate::domain::errors::IndexerError;
use crate::domain::gcs::GcsFilter;
use crate::domain::layout::{filter_header_key, filter_key};
use crate::ports::inbound::BlockIndexer;
use crate::ports::outbound::ChainClient;
use crate::service::indexer::Indexer;

/// Block hash -> compact filter and filter header.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterIndexer;

/// Basic filter elements: every output script except empty and `OP_RETURN`
/// ones, plus the script of every spent output.
pub fn basic_filter_elements(block: &Block, view: &CoinView) -> Result<Vec<Vec<u8>>, IndexerError> {
    let mut elements = Vec::new();

    for tx in &block.transactions {
        for output in &tx.outputs {
            if output.script.is_empty() || output.script[0] == OP_RETURN {
                continue;
            }
            elements.push(output.script.clone());
        }

        if tx.is_coinbase() {
            continue;
        }
        for input in &tx.inputs {
            let coin = view
                .get_output(&input.prevout)
                .ok_or_else(|| IndexerError::missing_coin(&input.prevout))?;
            if !coin.script.is_empty() {
                elements.push(coin.script.clone());
            }
        }
    }

    Ok(elements)
}

/// Build the basic filter of `block`.
pub fn basic_filter(block_hash: &Hash, block: &Block, view: &CoinView) -> Result<GcsFilter, IndexerError> {
    let elements = basic_filter_elements(block, view)?;
    let refs: Vec<&[u8]> = elements.iter().map(Vec::as_slice).collect();
    Ok(GcsFilter::new(block_hash, &refs))
}

fn read_header(store: &dyn KeyValueStore, hash: &Hash) -> Result<Option<Hash>, IndexerError> {
    match store.get(&filter_header_key(hash))? {
        Some(raw) => {
            let header: Hash = raw.as_slice().try_into().map_err(|_| {
                IndexerError::corrupt("filter header", format!("bad length {}", raw.len()))
            })?;
            Ok(Some(header))
        }
        None => Ok(None),
    }
}

impl BlockIndexer for FilterIndexer {
    fn index_block(
        &self,
        store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        let prev_header = if entry.is_genesis() {
            ZERO_HASH
        } else {
            read_header(store, &entry.prev_hash)?.ok_or(IndexerError::MissingFilterHeader {
                hash: entry.prev_hash,
            })?
        };

        let filter = basic_filter(&entry.hash, block, view)?;
        let header = filter.header(&prev_header);

        Ok(vec![
            BatchOperation::put(filter_key(&entry.hash), filter.to_bytes()),
            BatchOperation::put(filter_header_key(&entry.hash), header.to_vec()),
        ])
    }

    fn unindex_block(
        &self,
        _store: &dyn KeyValueStore,
        entry: &ChainEntry,
        _block: &Block,
        _view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        Ok(vec![
            BatchOperation::delete(filter_key(&entry.hash)),
            BatchOperation::delete(filter_header_key(&entry.hash)),
        ])
    }
}

/// Filter index over a key-value store and chain.
pub type FilterIndex<KV, C> = Indexer<FilterIndexer, KV, C>;

impl<KV: KeyValueStore, C: ChainClient> Indexer<FilterIndexer, KV, C> {
    /// Serialized basic filter of a block.
    pub fn get_cfilter(&self, hash: &Hash) -> Result<Option<Vec<u8>>, IndexerError> {
        self.ensure_open()?;
        Ok(self.store().get(&filter_key(hash))?)
    }

    /// Parsed basic filter of a block, ready for matching.
    pub fn get_filter(&self, hash: &Hash) -> Result<Option<GcsFilter>, IndexerError> {
        match self.get_cfilter(hash)? {
            Some(raw) => Ok(Some(GcsFilter::from_bytes(hash, &raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_cfheader(&self, hash: &Hash) -> Result<Option<Hash>, IndexerError> {
        self.ensure_open()?;
        read_header(self.store(), hash)
    }
}

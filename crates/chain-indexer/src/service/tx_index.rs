//! # Transaction Index
//!
//! `t[tx] -> TxMeta` for every confirmed transaction.

use block_storage::{BatchOperation, KeyValueStore};
use shared_types::{Block, ChainEntry, CoinView, Hash, Transaction};

use crate::domain::errors::IndexerError;
use crate::domain::layout::tx_key;
use crate::domain::txmeta::TxMeta;
use crate::ports::inbound::BlockIndexer;
use crate::ports::outbound::ChainClient;
use crate::service::indexer::Indexer;

/// Transaction hash -> metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxIndexer;

impl BlockIndexer for TxIndexer {
    fn index_block(
        &self,
        _store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        _view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        Ok(block
            .transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| {
                let meta = TxMeta {
                    block: entry.hash,
                    height: entry.height,
                    time: entry.time,
                    index: index as u32,
                    tx: tx.clone(),
                };
                BatchOperation::put(tx_key(&tx.hash()), meta.to_bytes())
            })
            .collect())
    }

    fn unindex_block(
        &self,
        _store: &dyn KeyValueStore,
        _entry: &ChainEntry,
        block: &Block,
        _view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        Ok(block
            .transactions
            .iter()
            .map(|tx| BatchOperation::delete(tx_key(&tx.hash())))
            .collect())
    }
}

/// Transaction index over a key-value store and chain.
pub type TxIndex<KV, C> = Indexer<TxIndexer, KV, C>;

impl<KV: KeyValueStore, C: ChainClient> Indexer<TxIndexer, KV, C> {
    /// Metadata of a confirmed transaction.
    pub fn get_meta(&self, hash: &Hash) -> Result<Option<TxMeta>, IndexerError> {
        self.ensure_open()?;
        match self.store().get(&tx_key(hash))? {
            Some(raw) => Ok(Some(TxMeta::from_bytes(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_tx(&self, hash: &Hash) -> Result<Option<Transaction>, IndexerError> {
        Ok(self.get_meta(hash)?.map(|meta| meta.tx))
    }

    pub fn has_tx(&self, hash: &Hash) -> Result<bool, IndexerError> {
        self.ensure_open()?;
        Ok(self.store().exists(&tx_key(hash))?)
    }
}

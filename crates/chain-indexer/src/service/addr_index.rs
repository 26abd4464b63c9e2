//! # Address Index
//!
//! For every recognized address:
//!
//! - `T[addr][height][index][tx]`: transactions touching the address, in
//!   chronological order (outputs paying it and inputs spending from it)
//! - `A[addr][tx]`: where `tx` sits in that listing, to resolve `after`
//! - `C[addr][tx][output]`: outputs paying it that are still unspent
//!
//! Pages never skip or repeat entries: `after` is exclusive and keys are
//! fixed width, so the next page starts strictly past the cursor.

use std::collections::BTreeSet;

use block_storage::{BatchOperation, KeyValueStore, ScanOptions};
use shared_types::{Address, Block, ChainEntry, Coin, CoinView, Hash, OutPoint, Transaction};

use crate::domain::errors::IndexerError;
use crate::domain::layout::{
    addr_coin_key, addr_coin_range, addr_position_key, addr_tx_key, addr_tx_range,
    decode_position, encode_position, parse_addr_coin_key, parse_addr_tx_key,
};
use crate::ports::inbound::BlockIndexer;
use crate::ports::outbound::ChainClient;
use crate::service::indexer::Indexer;

/// Address -> transactions and unspent outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddrIndexer;

/// Pagination for [`get_hashes_by_address`](Indexer::get_hashes_by_address).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressQuery {
    /// Page size; `None` means the configured maximum.
    pub limit: Option<usize>,
    /// Newest first.
    pub reverse: bool,
    /// Start strictly after this transaction (before it when `reverse`).
    pub after: Option<Hash>,
}

impl AddressQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn after(mut self, after: Hash) -> Self {
        self.after = Some(after);
        self
    }
}

/// Address hashes a transaction touches: its outputs plus the spent coins.
fn touched_addresses(tx: &Transaction, view: &CoinView) -> Result<BTreeSet<Hash>, IndexerError> {
    let mut addrs: BTreeSet<Hash> = tx
        .outputs
        .iter()
        .filter_map(|output| output.address())
        .map(|addr| addr.hash())
        .collect();

    if !tx.is_coinbase() {
        for input in &tx.inputs {
            if let Some(addr) = spent_address(view, &input.prevout)? {
                addrs.insert(addr);
            }
        }
    }
    Ok(addrs)
}

fn spent_address(view: &CoinView, prevout: &OutPoint) -> Result<Option<Hash>, IndexerError> {
    let coin = view
        .get_output(prevout)
        .ok_or_else(|| IndexerError::missing_coin(prevout))?;
    Ok(coin.address().map(|addr| addr.hash()))
}

impl BlockIndexer for AddrIndexer {
    fn index_block(
        &self,
        _store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        let mut ops = Vec::new();

        for (index, tx) in block.transactions.iter().enumerate() {
            let index = index as u32;
            let hash = tx.hash();

            for addr in touched_addresses(tx, view)? {
                ops.push(BatchOperation::put(
                    addr_tx_key(&addr, entry.height, index, &hash),
                    Vec::new(),
                ));
                ops.push(BatchOperation::put(
                    addr_position_key(&addr, &hash),
                    encode_position(entry.height, index).to_vec(),
                ));
            }

            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let prevout = &input.prevout;
                    if let Some(addr) = spent_address(view, prevout)? {
                        ops.push(BatchOperation::delete(addr_coin_key(
                            &addr,
                            &prevout.hash,
                            prevout.index,
                        )));
                    }
                }
            }

            for (output_index, output) in tx.outputs.iter().enumerate() {
                if let Some(addr) = output.address() {
                    ops.push(BatchOperation::put(
                        addr_coin_key(&addr.hash(), &hash, output_index as u32),
                        Vec::new(),
                    ));
                }
            }
        }

        Ok(ops)
    }

    /// Undo in reverse transaction order so coins created and spent in the
    /// same block end up absent.
    fn unindex_block(
        &self,
        _store: &dyn KeyValueStore,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> Result<Vec<BatchOperation>, IndexerError> {
        let mut ops = Vec::new();

        for (index, tx) in block.transactions.iter().enumerate().rev() {
            let index = index as u32;
            let hash = tx.hash();

            for (output_index, output) in tx.outputs.iter().enumerate() {
                if let Some(addr) = output.address() {
                    ops.push(BatchOperation::delete(addr_coin_key(
                        &addr.hash(),
                        &hash,
                        output_index as u32,
                    )));
                }
            }

            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let prevout = &input.prevout;
                    if let Some(addr) = spent_address(view, prevout)? {
                        ops.push(BatchOperation::put(
                            addr_coin_key(&addr, &prevout.hash, prevout.index),
                            Vec::new(),
                        ));
                    }
                }
            }

            for addr in touched_addresses(tx, view)? {
                ops.push(BatchOperation::delete(addr_tx_key(
                    &addr,
                    entry.height,
                    index,
                    &hash,
                )));
                ops.push(BatchOperation::delete(addr_position_key(&addr, &hash)));
            }
        }

        Ok(ops)
    }
}

/// Address index over a key-value store and chain.
pub type AddrIndex<KV, C> = Indexer<AddrIndexer, KV, C>;

impl<KV: KeyValueStore, C: ChainClient> Indexer<AddrIndexer, KV, C> {
    /// Transactions touching `address`, oldest first unless `reverse`.
    pub fn get_hashes_by_address(
        &self,
        address: &Address,
        query: AddressQuery,
    ) -> Result<Vec<Hash>, IndexerError> {
        self.ensure_open()?;

        let max = self.config().max_address_results;
        let limit = query.limit.unwrap_or(max);
        if limit == 0 || limit > max {
            return Err(IndexerError::InvalidLimit {
                requested: limit,
                max,
            });
        }

        let addr = address.hash();
        let (mut gte, mut lte) = addr_tx_range(&addr);

        // The cursor's own key bounds the scan and is dropped from the result.
        let cursor = match query.after {
            Some(after) => {
                let raw = self
                    .store()
                    .get(&addr_position_key(&addr, &after))?
                    .ok_or(IndexerError::InvalidCursor { hash: after })?;
                let (height, index) = decode_position(&raw).ok_or_else(|| {
                    IndexerError::corrupt("address position", format!("bad length {}", raw.len()))
                })?;
                let key = addr_tx_key(&addr, height, index, &after);
                if query.reverse {
                    lte = key.clone();
                } else {
                    gte = key.clone();
                }
                Some(key)
            }
            None => None,
        };

        let scan_limit = limit + usize::from(cursor.is_some());
        let options = ScanOptions::range(gte, lte)
            .reverse(query.reverse)
            .limit(scan_limit);

        let mut hashes = Vec::with_capacity(limit);
        for (key, _) in self.store().scan(&options)? {
            if cursor.as_deref() == Some(key.as_slice()) {
                continue;
            }
            let hash = parse_addr_tx_key(&key)
                .ok_or_else(|| IndexerError::corrupt("address listing", "bad key length"))?;
            hashes.push(hash);
            if hashes.len() == limit {
                break;
            }
        }
        Ok(hashes)
    }

    /// Unspent outputs paying `address`, resolved through the chain.
    pub async fn get_coins_by_address(&self, address: &Address) -> Result<Vec<Coin>, IndexerError> {
        self.ensure_open()?;

        let (gte, lte) = addr_coin_range(&address.hash());
        let keys = self.store().scan(&ScanOptions::range(gte, lte))?;

        let mut coins = Vec::with_capacity(keys.len());
        for (key, _) in keys {
            let (hash, index) = parse_addr_coin_key(&key)
                .ok_or_else(|| IndexerError::corrupt("address coin", "bad key length"))?;
            let coin = self
                .chain()
                .get_coin(&hash, index)
                .await?
                .ok_or_else(|| IndexerError::missing_coin(&OutPoint::new(hash, index)))?;
            coins.push(coin);
        }
        Ok(coins)
    }
}

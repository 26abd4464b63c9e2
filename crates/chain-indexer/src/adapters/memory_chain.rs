//! In-memory chain collaborator for tests and tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Block, BlockHeader, ChainEntry, Coin, CoinView, Hash, OutPoint, Transaction, TxOutput,
};

use crate::ports::outbound::{ChainClient, ChainError};

/// Where an output was created.
#[derive(Clone)]
struct OutputRecord {
    output: TxOutput,
    height: u32,
    coinbase: bool,
}

struct ChainState {
    blocks: HashMap<Hash, (ChainEntry, Block)>,
    /// Main chain by height; never empty.
    main: Vec<ChainEntry>,
    genesis: ChainEntry,
    /// Every output ever created on any branch.
    outputs: HashMap<OutPoint, OutputRecord>,
}

/// Block tree with a selectable main chain.
///
/// Blocks extending the tip join the main chain; anything else is kept as
/// a side branch until [`set_tip`](Self::set_tip) switches to it.
pub struct MemoryChain {
    state: RwLock<ChainState>,
}

impl MemoryChain {
    pub fn new(genesis: Block) -> Self {
        let entry = ChainEntry::from_block(&genesis, 0);
        let mut state = ChainState {
            blocks: HashMap::new(),
            main: vec![entry],
            genesis: entry,
            outputs: HashMap::new(),
        };
        record_outputs(&mut state.outputs, &genesis, 0);
        state.blocks.insert(entry.hash, (entry, genesis));
        Self {
            state: RwLock::new(state),
        }
    }

    /// Block with the given parent, transactions and nonce, timestamped ten
    /// minutes after the parent.
    pub fn child_block(parent: &ChainEntry, transactions: Vec<Transaction>, nonce: u32) -> Block {
        let mut block = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: parent.hash,
                merkle_root: [0; 32],
                time: parent.time + 600,
                bits: 0,
                nonce,
            },
            transactions,
        };
        block.header.merkle_root = block.compute_merkle_root();
        block
    }

    /// Add a block whose parent is known. Extends the main chain when the
    /// parent is the tip.
    pub fn add_block(&self, block: Block) -> Result<ChainEntry, ChainError> {
        let mut state = self.state.write();
        let parent = state
            .blocks
            .get(&block.prev_hash())
            .map(|(entry, _)| *entry)
            .ok_or_else(|| ChainError::Inconsistent("unknown parent".to_string()))?;

        let entry = ChainEntry::from_block(&block, parent.height + 1);
        if state.main.last().map(|tip| tip.hash) == Some(parent.hash) {
            state.main.push(entry);
        }
        record_outputs(&mut state.outputs, &block, entry.height);
        state.blocks.insert(entry.hash, (entry, block));
        Ok(entry)
    }

    /// Make the branch ending at `hash` the main chain.
    pub fn set_tip(&self, hash: &Hash) -> Result<(), ChainError> {
        let mut state = self.state.write();
        let mut branch = Vec::new();
        let mut cursor = *hash;
        loop {
            let (entry, _) = state
                .blocks
                .get(&cursor)
                .ok_or_else(|| ChainError::Inconsistent("unknown block".to_string()))?;
            branch.push(*entry);
            if entry.is_genesis() {
                break;
            }
            cursor = entry.prev_hash;
        }
        branch.reverse();
        state.main = branch;
        Ok(())
    }

    pub fn tip(&self) -> ChainEntry {
        let state = self.state.read();
        state.main.last().copied().unwrap_or(state.genesis)
    }

    pub fn height(&self) -> u32 {
        (self.state.read().main.len() - 1) as u32
    }

    /// Main-chain entry at `height`.
    pub fn entry_at(&self, height: u32) -> Option<ChainEntry> {
        self.state.read().main.get(height as usize).copied()
    }

    pub fn entry(&self, hash: &Hash) -> Option<ChainEntry> {
        self.state.read().blocks.get(hash).map(|(entry, _)| *entry)
    }

    pub fn block(&self, hash: &Hash) -> Option<Block> {
        self.state.read().blocks.get(hash).map(|(_, block)| block.clone())
    }

    /// Spent-coin view for `block`. Outputs created by any branch resolve.
    pub fn view_for(&self, block: &Block) -> CoinView {
        let state = self.state.read();
        let mut view = CoinView::new();
        for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
            for input in &tx.inputs {
                if let Some(record) = state.outputs.get(&input.prevout) {
                    view.add_output(input.prevout, record.output.clone());
                }
            }
        }
        view
    }
}

fn record_outputs(outputs: &mut HashMap<OutPoint, OutputRecord>, block: &Block, height: u32) {
    for tx in &block.transactions {
        let hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            outputs.insert(
                OutPoint::new(hash, index as u32),
                OutputRecord {
                    output: output.clone(),
                    height,
                    coinbase: tx.is_coinbase(),
                },
            );
        }
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn get_tip(&self) -> Result<ChainEntry, ChainError> {
        Ok(self.tip())
    }

    async fn get_entry(&self, hash: &Hash) -> Result<Option<ChainEntry>, ChainError> {
        Ok(self.entry(hash))
    }

    async fn get_entry_by_height(&self, height: u32) -> Result<Option<ChainEntry>, ChainError> {
        Ok(self.entry_at(height))
    }

    async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, ChainError> {
        Ok(self.block(hash))
    }

    async fn get_block_view(&self, block: &Block) -> Result<CoinView, ChainError> {
        Ok(self.view_for(block))
    }

    /// Replays the main chain; fine for test-sized chains.
    async fn get_coin(&self, hash: &Hash, index: u32) -> Result<Option<Coin>, ChainError> {
        let state = self.state.read();
        let target = OutPoint::new(*hash, index);

        let mut unspent = false;
        let main_blocks = state
            .main
            .iter()
            .filter_map(|entry| state.blocks.get(&entry.hash))
            .map(|(_, block)| block);
        for block in main_blocks {
            for tx in &block.transactions {
                if !tx.is_coinbase() && tx.inputs.iter().any(|input| input.prevout == target) {
                    unspent = false;
                }
                if tx.hash() == *hash && (index as usize) < tx.outputs.len() {
                    unspent = true;
                }
            }
        }

        if !unspent {
            return Ok(None);
        }
        Ok(state.outputs.get(&target).map(|record| Coin {
            hash: *hash,
            index,
            height: record.height,
            coinbase: record.coinbase,
            value: record.output.value,
            script: record.output.script.clone(),
        }))
    }

    async fn is_main_chain(&self, entry: &ChainEntry) -> Result<bool, ChainError> {
        Ok(self.entry_at(entry.height).map(|main| main.hash) == Some(entry.hash))
    }
}

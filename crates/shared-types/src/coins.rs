//! # Coins
//!
//! Unspent outputs and the spent-coin view supplied alongside each block.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::Address;
use crate::entities::{Hash, OutPoint, TxOutput};

/// An unspent transaction output with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Creating transaction hash.
    pub hash: Hash,
    /// Output index in the creating transaction.
    pub index: u32,
    /// Height of the block that created the output.
    pub height: u32,
    /// Whether the creating transaction was a coinbase.
    pub coinbase: bool,
    pub value: u64,
    pub script: Vec<u8>,
}

impl Coin {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.hash, self.index)
    }

    pub fn address(&self) -> Option<Address> {
        Address::from_script(&self.script)
    }
}

/// Outputs spent by a block, keyed by outpoint.
///
/// Supplied by the chain collaborator so indexers can resolve the address
/// and value of every non-coinbase input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinView {
    outputs: HashMap<OutPoint, TxOutput>,
}

impl CoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, prevout: OutPoint, output: TxOutput) {
        self.outputs.insert(prevout, output);
    }

    pub fn get_output(&self, prevout: &OutPoint) -> Option<&TxOutput> {
        self.outputs.get(prevout)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.outputs.iter()
    }
}

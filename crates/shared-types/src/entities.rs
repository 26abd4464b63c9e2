//! # Core Chain Entities
//!
//! The chain collaborator hands these to the storage layer:
//!
//! - **Blocks**: `BlockHeader`, `Block`
//! - **Transactions**: `OutPoint`, `TxInput`, `TxOutput`, `Transaction`
//! - **Chain position**: `ChainEntry`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::errors::DecodeError;

/// A 32-byte hash (double SHA-256 for blocks and transactions).
pub type Hash = [u8; 32];

/// The all-zero hash. Used as the genesis predecessor.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Script opcode marking a provably unspendable output.
pub const OP_RETURN: u8 = 0x6a;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Double SHA-256 of `data`.
pub fn sha256d(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// Short hex rendering of a hash for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction that created the output.
    pub hash: Hash,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The outpoint a coinbase input refers to.
    pub fn null() -> Self {
        Self {
            hash: ZERO_HASH,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash == ZERO_HASH && self.index == u32::MAX
    }
}

/// A transaction input spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Output being spent.
    pub prevout: OutPoint,
    /// Unlocking script.
    pub script: Vec<u8>,
    /// Sequence number.
    pub sequence: u32,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Value in base units.
    pub value: u64,
    /// Locking script.
    pub script: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        Self { value, script }
    }

    /// Address paid by this output, if the script matches a known template.
    pub fn address(&self) -> Option<Address> {
        Address::from_script(&self.script)
    }

    /// Whether the output can never be spent.
    pub fn is_unspendable(&self) -> bool {
        self.script.first() == Some(&OP_RETURN)
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    /// Transaction hash: double SHA-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        sha256d(&self.to_bytes())
    }

    /// A coinbase has exactly one input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing plain structs of vectors and integers into memory cannot fail.
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        bincode::deserialize(data).map_err(|e| DecodeError::malformed("transaction", e))
    }
}

// =============================================================================
// BLOCKS
// =============================================================================

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u32,
    /// Hash of the parent block (creates the chain linkage).
    pub prev_hash: Hash,
    /// Merkle root of all transactions in the block.
    pub merkle_root: Hash,
    /// Unix timestamp of the block.
    pub time: u64,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

/// A full block as stored and indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block hash: double SHA-256 of the encoded header.
    pub fn hash(&self) -> Hash {
        // Header is fixed-shape; in-memory encoding cannot fail.
        sha256d(&bincode::serialize(&self.header).unwrap_or_default())
    }

    pub fn prev_hash(&self) -> Hash {
        self.header.prev_hash
    }

    /// Merkle root over the transaction hashes (last hash duplicated on odd levels).
    pub fn compute_merkle_root(&self) -> Hash {
        let mut level: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
        if level.is_empty() {
            return ZERO_HASH;
        }
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let right = pair.get(1).unwrap_or(&pair[0]);
                    let mut buf = [0u8; 64];
                    buf[..32].copy_from_slice(&pair[0]);
                    buf[32..].copy_from_slice(right);
                    sha256d(&buf)
                })
                .collect();
        }
        level[0]
    }

    /// Serialized block bytes, as written to the block store.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        bincode::deserialize(data).map_err(|e| DecodeError::malformed("block", e))
    }
}

// =============================================================================
// CHAIN POSITION
// =============================================================================

/// A block's position in the chain, as tracked by the chain collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Block hash.
    pub hash: Hash,
    /// Height above genesis (genesis is 0).
    pub height: u32,
    /// Hash of the parent block.
    pub prev_hash: Hash,
    /// Block timestamp.
    pub time: u64,
}

impl ChainEntry {
    /// Build the entry for `block` at `height`.
    pub fn from_block(block: &Block, height: u32) -> Self {
        Self {
            hash: block.hash(),
            height,
            prev_hash: block.header.prev_hash,
            time: block.header.time,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

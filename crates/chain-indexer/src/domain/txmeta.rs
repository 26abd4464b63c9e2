use serde::{Deserialize, Serialize};
use shared_types::{DecodeError, Hash, Transaction};

/// A transaction together with where it was confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMeta {
    /// Containing block.
    pub block: Hash,
    pub height: u32,
    /// Block timestamp.
    pub time: u64,
    /// Position within the block.
    pub index: u32,
    pub tx: Transaction,
}

impl TxMeta {
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        bincode::deserialize(data).map_err(|e| DecodeError::Malformed {
            what: "tx meta",
            message: e.to_string(),
        })
    }
}

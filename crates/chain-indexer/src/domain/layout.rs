//! # Index Key Layout
//!
//! Each index lives in its own key-value store. Keys are a one-byte prefix
//! followed by fixed-width fields; integers are big-endian so they sort
//! numerically.
//!
//! | Key | Value |
//! |-----|-------|
//! | `V` | layout version (u32 LE) |
//! | `R` | [`IndexSyncState`](crate::domain::state::IndexSyncState) |
//! | `h[height]` | block hash |
//! | `t[tx]` | [`TxMeta`](crate::domain::txmeta::TxMeta) |
//! | `A[addr][tx]` | height, index of `tx` |
//! | `T[addr][height][index][tx]` | empty |
//! | `C[addr][tx][output]` | empty |
//! | `g[block]` | serialized basic filter |
//! | `G[block]` | filter header |

use shared_types::Hash;

/// Bump when any key or value encoding changes.
pub const LAYOUT_VERSION: u32 = 1;

/// Length of a `T` key.
const ADDR_TX_KEY_LEN: usize = 1 + 32 + 4 + 4 + 32;

/// Length of a `C` key.
const ADDR_COIN_KEY_LEN: usize = 1 + 32 + 32 + 4;

/// Key prefixes for index records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    Version,
    State,
    Height,
    Tx,
    AddrPosition,
    AddrTx,
    AddrCoin,
    Filter,
    FilterHeader,
}

impl IndexKey {
    pub fn as_byte(&self) -> u8 {
        match self {
            IndexKey::Version => b'V',
            IndexKey::State => b'R',
            IndexKey::Height => b'h',
            IndexKey::Tx => b't',
            IndexKey::AddrPosition => b'A',
            IndexKey::AddrTx => b'T',
            IndexKey::AddrCoin => b'C',
            IndexKey::Filter => b'g',
            IndexKey::FilterHeader => b'G',
        }
    }

    fn build(&self, parts: &[&[u8]]) -> Vec<u8> {
        let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
        let mut key = Vec::with_capacity(len);
        key.push(self.as_byte());
        for part in parts {
            key.extend_from_slice(part);
        }
        key
    }
}

pub fn version_key() -> Vec<u8> {
    IndexKey::Version.build(&[])
}

pub fn state_key() -> Vec<u8> {
    IndexKey::State.build(&[])
}

pub fn height_key(height: u32) -> Vec<u8> {
    IndexKey::Height.build(&[&height.to_be_bytes()])
}

pub fn tx_key(hash: &Hash) -> Vec<u8> {
    IndexKey::Tx.build(&[hash])
}

pub fn addr_position_key(addr: &Hash, tx: &Hash) -> Vec<u8> {
    IndexKey::AddrPosition.build(&[addr, tx])
}

/// Chronological listing key, ordered by height then in-block index.
pub fn addr_tx_key(addr: &Hash, height: u32, index: u32, tx: &Hash) -> Vec<u8> {
    IndexKey::AddrTx.build(&[addr, &height.to_be_bytes(), &index.to_be_bytes(), tx])
}

/// Inclusive bounds covering every `T` key of `addr`.
pub fn addr_tx_range(addr: &Hash) -> (Vec<u8>, Vec<u8>) {
    let gte = IndexKey::AddrTx.build(&[addr]);
    let mut lte = gte.clone();
    lte.resize(ADDR_TX_KEY_LEN, 0xff);
    (gte, lte)
}

/// Transaction hash of a `T` key.
pub fn parse_addr_tx_key(key: &[u8]) -> Option<Hash> {
    if key.len() != ADDR_TX_KEY_LEN || key[0] != IndexKey::AddrTx.as_byte() {
        return None;
    }
    key[ADDR_TX_KEY_LEN - 32..].try_into().ok()
}

pub fn addr_coin_key(addr: &Hash, tx: &Hash, index: u32) -> Vec<u8> {
    IndexKey::AddrCoin.build(&[addr, tx, &index.to_be_bytes()])
}

/// Inclusive bounds covering every `C` key of `addr`.
pub fn addr_coin_range(addr: &Hash) -> (Vec<u8>, Vec<u8>) {
    let gte = IndexKey::AddrCoin.build(&[addr]);
    let mut lte = gte.clone();
    lte.resize(ADDR_COIN_KEY_LEN, 0xff);
    (gte, lte)
}

/// Outpoint `(tx, index)` of a `C` key.
pub fn parse_addr_coin_key(key: &[u8]) -> Option<(Hash, u32)> {
    if key.len() != ADDR_COIN_KEY_LEN || key[0] != IndexKey::AddrCoin.as_byte() {
        return None;
    }
    let tx: Hash = key[33..65].try_into().ok()?;
    let index = u32::from_be_bytes(key[65..].try_into().ok()?);
    Some((tx, index))
}

/// `A` value: the position of a transaction in the listing.
pub fn encode_position(height: u32, index: u32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&height.to_be_bytes());
    buf[4..].copy_from_slice(&index.to_be_bytes());
    buf
}

pub fn decode_position(value: &[u8]) -> Option<(u32, u32)> {
    if value.len() != 8 {
        return None;
    }
    let height = u32::from_be_bytes(value[..4].try_into().ok()?);
    let index = u32::from_be_bytes(value[4..].try_into().ok()?);
    Some((height, index))
}

pub fn filter_key(block: &Hash) -> Vec<u8> {
    IndexKey::Filter.build(&[block])
}

pub fn filter_header_key(block: &Hash) -> Vec<u8> {
    IndexKey::FilterHeader.build(&[block])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_tx_keys_sort_chronologically() {
        let addr = [7; 32];
        let keys = [
            addr_tx_key(&addr, 1, 5, &[0xff; 32]),
            addr_tx_key(&addr, 2, 0, &[0x00; 32]),
            addr_tx_key(&addr, 2, 1, &[0x00; 32]),
            addr_tx_key(&addr, 256, 0, &[0x00; 32]),
        ];
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_addr_ranges_cover_only_one_address() {
        let (gte, lte) = addr_tx_range(&[7; 32]);
        let inside = addr_tx_key(&[7; 32], u32::MAX, u32::MAX, &[0xff; 32]);
        let outside = addr_tx_key(&[8; 32], 0, 0, &[0; 32]);
        assert!(inside >= gte && inside <= lte);
        assert!(outside > lte);

        let (gte, lte) = addr_coin_range(&[7; 32]);
        let coin = addr_coin_key(&[7; 32], &[0xff; 32], u32::MAX);
        assert!(coin >= gte && coin <= lte);
    }

    #[test]
    fn test_parse_keys() {
        let key = addr_tx_key(&[1; 32], 10, 2, &[9; 32]);
        assert_eq!(parse_addr_tx_key(&key), Some([9; 32]));
        assert_eq!(parse_addr_tx_key(&key[..40]), None);

        let key = addr_coin_key(&[1; 32], &[3; 32], 300);
        assert_eq!(parse_addr_coin_key(&key), Some(([3; 32], 300)));
        assert_eq!(parse_addr_coin_key(&tx_key(&[3; 32])), None);
    }

    #[test]
    fn test_position_roundtrip() {
        assert_eq!(decode_position(&encode_position(70_000, 3)), Some((70_000, 3)));
        assert_eq!(decode_position(&[0; 7]), None);
    }

    #[test]
    fn test_height_keys_sort_numerically() {
        assert!(height_key(255) < height_key(256));
    }
}

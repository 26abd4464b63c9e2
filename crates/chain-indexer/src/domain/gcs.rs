//! # GCS Filters (Golomb-Coded Sets) - BIP 158
//!
//! Deterministic per-block filters served identically to every light
//! client. A client downloads the filter and tests its own scripts locally,
//! so nothing about what it watches leaks to the node.
//!
//! ## Algorithm
//!
//! 1. SipHash-2-4 every element, keyed with the first 16 bytes of the block hash
//! 2. Map each hash uniformly into `[0, N * M)`
//! 3. Sort and take consecutive differences
//! 4. Golomb-Rice encode the differences with parameter `P`
//!
//! Serialized as `CompactSize(N)` followed by the bit stream.
//!
//! Filters chain through headers:
//! `header = sha256d(sha256d(filter) || prev_header)`.

use bitvec::prelude::*;
use sha2::{Digest, Sha256};
use shared_types::{sha256d, DecodeError, Hash};
use siphasher::sip::SipHasher24;

/// Golomb-Rice parameter P: remainders are P bits wide.
pub const GOLOMB_P: u8 = 19;

/// Inverse false-positive rate M (BIP 158 basic filter).
pub const GCS_M: u64 = 784_931;

/// False positive rate for one query element (1 / M).
pub const GCS_FPR: f64 = 1.0 / (GCS_M as f64);

/// Golomb-Coded Set filter for a single block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcsFilter {
    /// Number of elements in the filter.
    pub n: u32,
    /// Golomb-Rice encoded stream (without the element count).
    pub data: Vec<u8>,
    /// SipHash key derived from the block hash.
    pub key: [u8; 16],
}

impl GcsFilter {
    /// Build a filter over `elements` for the block `block_hash`.
    ///
    /// Duplicate elements are encoded once.
    pub fn new(block_hash: &Hash, elements: &[&[u8]]) -> Self {
        let key = derive_key(block_hash);

        let mut unique: Vec<&[u8]> = elements.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let n = unique.len() as u64;
        let range = n * GCS_M;
        let mut values: Vec<u64> = unique
            .iter()
            .map(|item| hash_to_range(item, &key, range))
            .collect();
        values.sort_unstable();

        let mut deltas = Vec::with_capacity(values.len());
        let mut prev = 0u64;
        for v in values {
            deltas.push(v - prev);
            prev = v;
        }

        Self {
            n: n as u32,
            data: golomb_encode(&deltas),
            key,
        }
    }

    /// Parse a serialized filter for the block `block_hash`.
    pub fn from_bytes(block_hash: &Hash, bytes: &[u8]) -> Result<Self, DecodeError> {
        let (n, used) = read_compact_size(bytes)?;
        let n = u32::try_from(n).map_err(|_| DecodeError::Malformed {
            what: "filter",
            message: format!("element count {} out of range", n),
        })?;
        let filter = Self {
            n,
            data: bytes[used..].to_vec(),
            key: derive_key(block_hash),
        };
        // Reject truncated streams up front rather than at query time.
        filter.values()?;
        Ok(filter)
    }

    /// `CompactSize(N) || stream`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.data.len());
        write_compact_size(&mut out, self.n as u64);
        out.extend_from_slice(&self.data);
        out
    }

    /// Whether any of `elements` may be in the set.
    ///
    /// `false` is definitive; `true` is wrong with probability about
    /// `elements.len() / M`.
    pub fn match_any(&self, elements: &[&[u8]]) -> Result<bool, DecodeError> {
        if self.n == 0 || elements.is_empty() {
            return Ok(false);
        }

        let values = self.values()?;
        let range = self.n as u64 * GCS_M;
        Ok(elements
            .iter()
            .any(|item| values.binary_search(&hash_to_range(item, &self.key, range)).is_ok()))
    }

    pub fn match_one(&self, element: &[u8]) -> Result<bool, DecodeError> {
        self.match_any(&[element])
    }

    /// Double SHA-256 of the serialized filter.
    pub fn hash(&self) -> Hash {
        sha256d(&self.to_bytes())
    }

    /// Header chaining this filter onto `prev_header`.
    pub fn header(&self, prev_header: &Hash) -> Hash {
        chain_header(&self.hash(), prev_header)
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Sorted absolute set members.
    fn values(&self) -> Result<Vec<u64>, DecodeError> {
        let deltas = golomb_decode(&self.data, self.n as usize)?;
        let mut sum = 0u64;
        Ok(deltas
            .into_iter()
            .map(|delta| {
                sum = sum.saturating_add(delta);
                sum
            })
            .collect())
    }
}

/// `sha256d(filter_hash || prev_header)`.
pub fn chain_header(filter_hash: &Hash, prev_header: &Hash) -> Hash {
    let first = Sha256::new()
        .chain_update(filter_hash)
        .chain_update(prev_header)
        .finalize();
    Sha256::digest(first).into()
}

/// SipHash key: the first 16 bytes of the block hash.
fn derive_key(block_hash: &Hash) -> [u8; 16] {
    let mut key = [0u8; 16];
    key.copy_from_slice(&block_hash[0..16]);
    key
}

/// Map `data` uniformly into `[0, range)` with a multiply-and-shift.
fn hash_to_range(data: &[u8], key: &[u8; 16], range: u64) -> u64 {
    let mut k0 = [0u8; 8];
    let mut k1 = [0u8; 8];
    k0.copy_from_slice(&key[..8]);
    k1.copy_from_slice(&key[8..]);
    let hasher = SipHasher24::new_with_keys(u64::from_le_bytes(k0), u64::from_le_bytes(k1));
    let hash = hasher.hash(data);
    ((hash as u128 * range as u128) >> 64) as u64
}

/// Golomb-Rice encode a list of deltas, MSB first, zero padded.
fn golomb_encode(deltas: &[u64]) -> Vec<u8> {
    let mut bits: BitVec<u8, Msb0> = BitVec::new();
    let mask = (1u64 << GOLOMB_P) - 1;

    for &delta in deltas {
        let q = delta >> GOLOMB_P;
        let r = delta & mask;

        // Unary quotient: q ones then a zero.
        for _ in 0..q {
            bits.push(true);
        }
        bits.push(false);

        for i in (0..GOLOMB_P).rev() {
            bits.push((r >> i) & 1 == 1);
        }
    }

    bits.into_vec()
}

/// Decode exactly `n` deltas; a stream that ends early is malformed.
fn golomb_decode(data: &[u8], n: usize) -> Result<Vec<u64>, DecodeError> {
    let bits = data.view_bits::<Msb0>();
    let truncated = || DecodeError::Malformed {
        what: "filter",
        message: "golomb stream truncated".to_string(),
    };

    let mut deltas = Vec::with_capacity(n);
    let mut pos = 0usize;

    for _ in 0..n {
        let mut q = 0u64;
        loop {
            let bit = *bits.get(pos).ok_or_else(truncated)?;
            pos += 1;
            if !bit {
                break;
            }
            q += 1;
        }

        let end = pos + GOLOMB_P as usize;
        if end > bits.len() {
            return Err(truncated());
        }
        let r = bits[pos..end]
            .iter()
            .fold(0u64, |acc, bit| (acc << 1) | (*bit as u64));
        pos = end;

        deltas.push((q << GOLOMB_P) | r);
    }

    Ok(deltas)
}

fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Returns the value and the number of bytes consumed.
fn read_compact_size(bytes: &[u8]) -> Result<(u64, usize), DecodeError> {
    let short = |expected: usize| DecodeError::InvalidLength {
        what: "compact size",
        expected,
        actual: bytes.len(),
    };
    let first = *bytes.first().ok_or_else(|| short(1))?;
    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Ok((n as u64, 1)),
    };
    let field = bytes.get(1..1 + width).ok_or_else(|| short(1 + width))?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(field);
    Ok((u64::from_le_bytes(buf), 1 + width))
}

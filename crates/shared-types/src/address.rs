//! # Addresses
//!
//! Recognized output script templates and the fixed-width address hash used
//! as the leading component of address-index keys.

use serde::{Deserialize, Serialize};

use crate::entities::{sha256, Hash};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_0: u8 = 0x00;

/// Script template an address was recognized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AddressKind {
    PubkeyHash = 0,
    ScriptHash = 1,
    WitnessPubkeyHash = 2,
    WitnessScriptHash = 3,
}

/// A payment address: template plus program bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub kind: AddressKind,
    pub program: Vec<u8>,
}

impl Address {
    /// Pay-to-witness-pubkey-hash address.
    pub fn witness_pubkey_hash(program: [u8; 20]) -> Self {
        Self {
            kind: AddressKind::WitnessPubkeyHash,
            program: program.to_vec(),
        }
    }

    /// Pay-to-pubkey-hash address.
    pub fn pubkey_hash(program: [u8; 20]) -> Self {
        Self {
            kind: AddressKind::PubkeyHash,
            program: program.to_vec(),
        }
    }

    /// Recognize an address from a locking script.
    ///
    /// Returns `None` for non-standard scripts; those outputs are not indexed
    /// by address.
    pub fn from_script(script: &[u8]) -> Option<Self> {
        match script {
            [OP_DUP, OP_HASH160, 0x14, program @ .., OP_EQUALVERIFY, OP_CHECKSIG]
                if program.len() == 20 =>
            {
                Some(Self {
                    kind: AddressKind::PubkeyHash,
                    program: program.to_vec(),
                })
            }
            [OP_HASH160, 0x14, program @ .., OP_EQUAL] if program.len() == 20 => Some(Self {
                kind: AddressKind::ScriptHash,
                program: program.to_vec(),
            }),
            [OP_0, 0x14, program @ ..] if program.len() == 20 => Some(Self {
                kind: AddressKind::WitnessPubkeyHash,
                program: program.to_vec(),
            }),
            [OP_0, 0x20, program @ ..] if program.len() == 32 => Some(Self {
                kind: AddressKind::WitnessScriptHash,
                program: program.to_vec(),
            }),
            _ => None,
        }
    }

    /// Locking script paying this address.
    pub fn to_script(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(self.program.len() + 5);
        match self.kind {
            AddressKind::PubkeyHash => {
                script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
                script.extend_from_slice(&self.program);
                script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            }
            AddressKind::ScriptHash => {
                script.extend_from_slice(&[OP_HASH160, 0x14]);
                script.extend_from_slice(&self.program);
                script.push(OP_EQUAL);
            }
            AddressKind::WitnessPubkeyHash | AddressKind::WitnessScriptHash => {
                script.push(OP_0);
                script.push(self.program.len() as u8);
                script.extend_from_slice(&self.program);
            }
        }
        script
    }

    /// Fixed-width key component: SHA-256 over kind byte and program.
    pub fn hash(&self) -> Hash {
        let mut data = Vec::with_capacity(self.program.len() + 1);
        data.push(self.kind as u8);
        data.extend_from_slice(&self.program);
        sha256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_roundtrip_all_kinds() {
        let addrs = [
            Address::pubkey_hash([1; 20]),
            Address {
                kind: AddressKind::ScriptHash,
                program: vec![2; 20],
            },
            Address::witness_pubkey_hash([3; 20]),
            Address {
                kind: AddressKind::WitnessScriptHash,
                program: vec![4; 32],
            },
        ];

        for addr in addrs {
            assert_eq!(Address::from_script(&addr.to_script()), Some(addr));
        }
    }

    #[test]
    fn test_nonstandard_scripts_unrecognized() {
        assert_eq!(Address::from_script(&[]), None);
        assert_eq!(Address::from_script(&[0x6a, 0x01, 0xff]), None);
        assert_eq!(Address::from_script(&[0x00, 0x14, 1, 2, 3]), None);
    }

    #[test]
    fn test_hash_distinguishes_kind() {
        let a = Address::pubkey_hash([9; 20]);
        let b = Address::witness_pubkey_hash([9; 20]);
        assert_ne!(a.hash(), b.hash());
    }
}

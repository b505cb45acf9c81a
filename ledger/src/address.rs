//! # Addresses & Record Keys
//!
//! Every identity in the ledger (callers, external mint and vault handles,
//! stored records) is a 32-byte [`Address`]. Stored records are
//! content-addressed: a [`RecordKey`] names the record kind and its key
//! fields, and [`RecordKey::address`] hashes them into the storage slot.
//!
//! ```text
//! address = BLAKE3(seed || 0x00 || part_1 || 0x00 || part_2 ...)
//! ```
//!
//! Parts are fixed-width (32 bytes) so the separators are not strictly
//! needed for unambiguity, but they keep the preimage format identical to
//! the variable-width derivations used for external handles.

use rand::RngCore;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::config::{ALLOWANCE_SEED, BALANCE_SEED, TOKEN_INFO_SEED};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte opaque identifier.
///
/// Serializes as a hex string in human-readable formats (JSON, TOML) and as
/// raw bytes in binary formats (bincode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// Length of an address in bytes.
    pub const LEN: usize = 32;

    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != Self::LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Generates a random address. Handy for identities in tests and demos.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derives an address from a seed and a list of parts.
    pub fn derive(seed: &[u8], parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(seed);
        for part in parts {
            hasher.update(&[0x00]);
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_hex(&s).map_err(D::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Address)
        }
    }
}

// ---------------------------------------------------------------------------
// RecordKey
// ---------------------------------------------------------------------------

/// Composite key naming one ledger record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// The balance account of `owner`.
    Balance { owner: Address },
    /// The allowance `owner` granted to `spender`. Order matters.
    Allowance { owner: Address, spender: Address },
    /// The token info slot.
    TokenInfo,
}

impl RecordKey {
    /// Storage address of this record.
    pub fn address(&self) -> Address {
        match self {
            RecordKey::Balance { owner } => Address::derive(BALANCE_SEED, &[owner.as_bytes()]),
            RecordKey::Allowance { owner, spender } => {
                Address::derive(ALLOWANCE_SEED, &[owner.as_bytes(), spender.as_bytes()])
            }
            RecordKey::TokenInfo => Address::derive(TOKEN_INFO_SEED, &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let addr = Address::random();
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
        assert_eq!(addr.to_string().len(), 64);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(Address::from_hex("abcd").is_err());
        assert!(Address::from_hex("zz").is_err());
    }

    #[test]
    fn derivation_is_deterministic() {
        let owner = Address::new([7u8; 32]);
        let a = RecordKey::Balance { owner }.address();
        let b = RecordKey::Balance { owner }.address();
        assert_eq!(a, b);
    }

    #[test]
    fn record_kinds_never_collide() {
        let x = Address::new([1u8; 32]);
        let y = Address::new([2u8; 32]);

        let balance = RecordKey::Balance { owner: x }.address();
        let allowance = RecordKey::Allowance { owner: x, spender: y }.address();
        let info = RecordKey::TokenInfo.address();

        assert_ne!(balance, allowance);
        assert_ne!(balance, info);
        assert_ne!(allowance, info);
    }

    #[test]
    fn allowance_key_is_ordered() {
        let x = Address::new([1u8; 32]);
        let y = Address::new([2u8; 32]);
        assert_ne!(
            RecordKey::Allowance { owner: x, spender: y }.address(),
            RecordKey::Allowance { owner: y, spender: x }.address()
        );
    }

    #[test]
    fn serializes_as_hex_in_json_and_bytes_in_bincode() {
        let addr = Address::new([0xAB; 32]);

        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        let bin = bincode::serialize(&addr).unwrap();
        assert_eq!(bin.len(), 32);
        let back: Address = bincode::deserialize(&bin).unwrap();
        assert_eq!(back, addr);
    }
}

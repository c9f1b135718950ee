//! # Primitive Types
//!
//! The two value types everything else is built from: a 20-byte EVM
//! [`Address`] and the 256-bit unsigned [`U256`] used for every amount.
//!
//! Addresses render with the EIP-55 mixed-case checksum, the same string
//! go-ethereum's `Address.Hex()` produces, because applications embed them
//! in human-readable notices and clients compare those byte for byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{ABI_WORD_LENGTH, ADDRESS_LENGTH};
use crate::hash::keccak256;

pub use primitive_types::U256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing an [`Address`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    /// The string is not valid hexadecimal.
    #[error("invalid address hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded value is not exactly 20 bytes.
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract address.
///
/// Ordering is plain byte order, which keeps ledger iteration (and
/// therefore the ledger digest) deterministic.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The zero address. Valid as a transfer target; balances there just
    /// accumulate.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Copies an address out of a slice that must be exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let arr: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parses a hex address, with or without the `0x` prefix. The checksum
    /// casing is not enforced.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let digits = strip_hex_prefix(s);
        let bytes = hex::decode(digits)?;
        Self::from_slice(&bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 checksummed `0x`-prefixed hex.
    ///
    /// Each hex letter is uppercased when the matching nibble of
    /// `keccak256(lowercase_hex)` is 8 or more.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = digest[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Left-pads the address into a 32-byte ABI word.
    pub fn to_abi_word(&self) -> [u8; ABI_WORD_LENGTH] {
        let mut word = [0u8; ABI_WORD_LENGTH];
        word[ABI_WORD_LENGTH - ADDRESS_LENGTH..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// U256 helpers
// ---------------------------------------------------------------------------

/// Encodes an amount as a 32-byte big-endian ABI word.
pub fn u256_to_be_bytes(value: &U256) -> [u8; ABI_WORD_LENGTH] {
    let mut word = [0u8; ABI_WORD_LENGTH];
    value.to_big_endian(&mut word);
    word
}

/// Decodes a big-endian amount. Returns `None` for slices longer than
/// 32 bytes.
pub fn u256_from_be_slice(bytes: &[u8]) -> Option<U256> {
    if bytes.len() > ABI_WORD_LENGTH {
        return None;
    }
    Some(U256::from_big_endian(bytes))
}

/// Parses an amount written either in decimal or as `0x`-prefixed hex.
pub fn parse_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if digits.is_empty() {
            return None;
        }
        U256::from_str_radix(digits, 16).ok()
    } else {
        U256::from_dec_str(s).ok()
    }
}

/// Strips an optional `0x`/`0X` prefix.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decodes `0x`-prefixed (or bare) hex into bytes.
pub fn decode_hex_payload(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_hex_prefix(s))
}

/// Encodes bytes as `0x`-prefixed lowercase hex.
pub fn encode_hex_payload(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ---------------------------------------------------------------------------
// Serde adapters
// ---------------------------------------------------------------------------

/// Serde adapter for byte payloads as `0x`-prefixed hex strings, the
/// encoding the rollup HTTP API uses for every payload field.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Body {
///     #[serde(with = "crate::primitives::hex_bytes")]
///     payload: Vec<u8>,
/// }
/// ```
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex_payload(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex_payload(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter rendering amounts as decimal strings. Accepts decimal or
/// `0x` hex on input.
pub mod u256_dec {
    use super::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u256(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid uint256: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

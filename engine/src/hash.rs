//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **Keccak-256**: whatever has to agree with the EVM: function
//!   selectors and EIP-55 address checksums.
//! - **BLAKE3**: internal fingerprints such as [`Ledger::digest`]. Nothing
//!   outside this process needs to recompute them.
//!
//! [`Ledger::digest`]: crate::ledger::Ledger::digest

use sha3::{Digest, Keccak256};

/// Keccak-256 (the pre-standard SHA-3 variant Ethereum uses).
///
/// # Example
///
/// ```
/// use rollbook_engine::hash::keccak256;
///
/// let digest = keccak256(b"transfer(address,uint256)");
/// assert_eq!(&digest[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// BLAKE3 hash returned as a fixed-size array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

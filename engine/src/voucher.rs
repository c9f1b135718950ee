//! # Vouchers
//!
//! A voucher is a call the base chain executes on the rollup's behalf once
//! the epoch it belongs to is final. Withdrawals are vouchers addressed to
//! the token contract, carrying `transfer(account, amount)` calldata:
//!
//! ```text
//! offset  size  field
//! 0       4     selector a9059cbb
//! 4       32    account, left-padded with 12 zero bytes
//! 36      32    amount, big-endian
//! ```
//!
//! The encoding has to match the ABI bit for bit. A voucher with a wrong
//! byte executes against the wrong function or the wrong account and the
//! funds are gone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    ABI_WORD_LENGTH, ERC20_TRANSFER_CALLDATA_LENGTH, ERC20_TRANSFER_SELECTOR, SELECTOR_LENGTH,
};
use crate::hash::keccak256;
use crate::primitives::{hex_bytes, u256_dec, u256_from_be_slice, u256_to_be_bytes, Address, U256};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from decoding ERC20 transfer calldata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherError {
    /// Calldata is not 68 bytes long.
    #[error("invalid transfer calldata length: expected 68 bytes, got {0}")]
    InvalidLength(usize),

    /// The first four bytes are not the transfer selector.
    #[error("selector mismatch: expected a9059cbb, got {0}")]
    SelectorMismatch(String),

    /// The address word has non-zero bytes above the low 20.
    #[error("address argument has non-zero padding")]
    DirtyAddressPadding,
}

// ---------------------------------------------------------------------------
// Voucher
// ---------------------------------------------------------------------------

/// An outbound call to be executed on the base chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    /// Contract the call is sent to.
    pub destination: Address,
    /// ABI-encoded calldata.
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// Native currency attached to the call. Zero for token withdrawals.
    #[serde(with = "u256_dec")]
    pub value: U256,
}

impl Voucher {
    /// Creates a voucher.
    pub fn new(destination: Address, value: U256, payload: Vec<u8>) -> Self {
        Self {
            destination,
            payload,
            value,
        }
    }

    /// Builds the withdrawal voucher for `amount` of `token` to `account`.
    pub fn erc20_withdrawal(token: Address, account: Address, amount: U256) -> Self {
        let (destination, payload) = encode_withdrawal(token, account, amount);
        Self::new(destination, U256::zero(), payload)
    }

    /// Decodes the payload as ERC20 transfer calldata, if it is one.
    pub fn as_erc20_transfer(&self) -> Option<(Address, U256)> {
        decode_erc20_transfer(&self.payload).ok()
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// First four bytes of `keccak256(signature)`.
pub fn function_selector(signature: &str) -> [u8; SELECTOR_LENGTH] {
    let digest = keccak256(signature.as_bytes());
    let mut selector = [0u8; SELECTOR_LENGTH];
    selector.copy_from_slice(&digest[..SELECTOR_LENGTH]);
    selector
}

/// ABI calldata for `transfer(to, amount)`.
pub fn encode_erc20_transfer(to: Address, amount: U256) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(ERC20_TRANSFER_CALLDATA_LENGTH);
    calldata.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    calldata.extend_from_slice(&to.to_abi_word());
    calldata.extend_from_slice(&u256_to_be_bytes(&amount));
    calldata
}

/// Destination and calldata of a withdrawal: the token contract, asked to
/// transfer `amount` to `account`. Pure.
pub fn encode_withdrawal(token: Address, account: Address, amount: U256) -> (Address, Vec<u8>) {
    (token, encode_erc20_transfer(account, amount))
}

/// Inverse of [`encode_erc20_transfer`].
///
/// # Errors
///
/// Rejects calldata of the wrong length, with a different selector, or
/// whose address word is not a clean left-padded address.
pub fn decode_erc20_transfer(calldata: &[u8]) -> Result<(Address, U256), VoucherError> {
    if calldata.len() != ERC20_TRANSFER_CALLDATA_LENGTH {
        return Err(VoucherError::InvalidLength(calldata.len()));
    }

    let (selector, args) = calldata.split_at(SELECTOR_LENGTH);
    if selector != &ERC20_TRANSFER_SELECTOR[..] {
        return Err(VoucherError::SelectorMismatch(hex::encode(selector)));
    }

    let (to_word, amount_word) = args.split_at(ABI_WORD_LENGTH);
    let padding = ABI_WORD_LENGTH - crate::config::ADDRESS_LENGTH;
    if to_word[..padding].iter().any(|b| *b != 0) {
        return Err(VoucherError::DirtyAddressPadding);
    }

    let to = Address::from_slice(&to_word[padding..])
        .map_err(|_| VoucherError::InvalidLength(calldata.len()))?;
    let amount = u256_from_be_slice(amount_word)
        .ok_or(VoucherError::InvalidLength(calldata.len()))?;
    Ok((to, amount))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

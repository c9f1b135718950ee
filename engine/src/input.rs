//! # Inputs
//!
//! An advance input is a [`Metadata`] record plus an opaque payload. What
//! the payload means depends on who sent it: inputs relayed by the ERC20
//! portal carry a deposit header, everything else is handed to the
//! application untouched.
//!
//! ## ERC20 portal payload
//!
//! ```text
//! offset  size  field
//! 0       20    token
//! 20      20    sender
//! 40      32    amount, big-endian
//! 72      ..    execution-layer data
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ABI_WORD_LENGTH, ADDRESS_LENGTH, ERC20_DEPOSIT_HEADER_LENGTH};
use crate::config::EngineConfig;
use crate::error::CycleError;
use crate::primitives::{hex_bytes, u256_dec, u256_from_be_slice, u256_to_be_bytes, Address, U256};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Context the runtime attaches to every advance input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Chain the application is deployed on.
    #[serde(default)]
    pub chain_id: u64,
    /// The application contract.
    #[serde(default)]
    pub app_contract: Address,
    /// Account or contract that submitted the input.
    pub msg_sender: Address,
    /// Position of the input in the application's input sequence.
    pub input_index: u64,
    /// Base-chain block the input was included in.
    pub block_number: u64,
    /// Timestamp of that block, in seconds.
    #[serde(alias = "timestamp")]
    pub block_timestamp: u64,
}

/// One advance input as delivered by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub metadata: Metadata,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

/// Tokens moved into the rollup through the ERC20 portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Deposit {
    /// Token contract.
    pub token: Address,
    /// Account credited inside the rollup.
    pub sender: Address,
    /// Amount deposited.
    #[serde(with = "u256_dec")]
    pub value: U256,
    /// Whatever the depositor appended after the header.
    #[serde(with = "hex_bytes")]
    pub exec_layer_data: Vec<u8>,
}

impl Erc20Deposit {
    /// Parses the portal payload.
    ///
    /// # Errors
    ///
    /// [`CycleError::UnknownInputKind`] when the payload is shorter than
    /// the 72-byte header.
    pub fn decode(payload: &[u8]) -> Result<Self, CycleError> {
        if payload.len() < ERC20_DEPOSIT_HEADER_LENGTH {
            return Err(CycleError::UnknownInputKind {
                kind: format!("erc20 portal input of {} bytes", payload.len()),
            });
        }

        let (token, rest) = payload.split_at(ADDRESS_LENGTH);
        let (sender, rest) = rest.split_at(ADDRESS_LENGTH);
        let (amount, exec_layer_data) = rest.split_at(ABI_WORD_LENGTH);

        let malformed = || CycleError::UnknownInputKind {
            kind: "erc20 portal input".to_string(),
        };
        Ok(Self {
            token: Address::from_slice(token).map_err(|_| malformed())?,
            sender: Address::from_slice(sender).map_err(|_| malformed())?,
            value: u256_from_be_slice(amount).ok_or_else(malformed)?,
            exec_layer_data: exec_layer_data.to_vec(),
        })
    }

    /// Builds the portal payload for this deposit.
    pub fn encode(&self) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(ERC20_DEPOSIT_HEADER_LENGTH + self.exec_layer_data.len());
        payload.extend_from_slice(self.token.as_bytes());
        payload.extend_from_slice(self.sender.as_bytes());
        payload.extend_from_slice(&u256_to_be_bytes(&self.value));
        payload.extend_from_slice(&self.exec_layer_data);
        payload
    }
}

/// Every deposit kind the engine can decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Deposit {
    Erc20(Erc20Deposit),
}

impl Deposit {
    /// Short name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Deposit::Erc20(_) => "erc20",
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded input
// ---------------------------------------------------------------------------

/// An input after decoding: the deposit it carried, if any, and the
/// payload the application should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub metadata: Metadata,
    pub deposit: Option<Deposit>,
    pub payload: Vec<u8>,
}

impl Input {
    /// Classifies and decodes a raw input.
    ///
    /// Portal inputs are parsed and their execution-layer data becomes the
    /// payload. Inputs from anyone else pass through as-is.
    ///
    /// # Errors
    ///
    /// [`CycleError::UnknownInputKind`] if a portal input does not have the
    /// portal layout.
    pub fn decode(raw: RawInput, config: &EngineConfig) -> Result<Self, CycleError> {
        let RawInput { metadata, payload } = raw;

        if metadata.msg_sender == config.erc20_portal {
            let deposit = Erc20Deposit::decode(&payload)?;
            let payload = deposit.exec_layer_data.clone();
            return Ok(Self {
                metadata,
                deposit: Some(Deposit::Erc20(deposit)),
                payload,
            });
        }

        Ok(Self {
            metadata,
            deposit: None,
            payload,
        })
    }

    /// Name of the input kind, for logs.
    pub fn kind(&self) -> &'static str {
        match &self.deposit {
            Some(deposit) => deposit.kind(),
            None => "generic",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

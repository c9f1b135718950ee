//! # Engine Configuration & Constants
//!
//! Every magic number the engine depends on lives here: ABI layout sizes,
//! the ERC20 transfer selector, the portal address deposits arrive from,
//! and the default endpoints the node binds to.
//!
//! The layout constants are dictated by the EVM and the portal contracts.
//! Changing them does not change the protocol, it just breaks it.

use serde::{Deserialize, Serialize};

use crate::primitives::Address;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Engine version reported by the node.
pub const ENGINE_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// ABI Layout
// ---------------------------------------------------------------------------

/// Length of an EVM address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of one ABI-encoded argument word.
pub const ABI_WORD_LENGTH: usize = 32;

/// Length of a function selector.
pub const SELECTOR_LENGTH: usize = 4;

/// Canonical signature of the ERC20 transfer function.
pub const ERC20_TRANSFER_SIGNATURE: &str = "transfer(address,uint256)";

/// `keccak256("transfer(address,uint256)")[..4]`. Checked against the hash
/// in the voucher tests.
pub const ERC20_TRANSFER_SELECTOR: [u8; SELECTOR_LENGTH] = [0xa9, 0x05, 0x9c, 0xbb];

/// Selector plus two ABI words: `to` and `amount`.
pub const ERC20_TRANSFER_CALLDATA_LENGTH: usize = SELECTOR_LENGTH + 2 * ABI_WORD_LENGTH;

// ---------------------------------------------------------------------------
// Portal Layout
// ---------------------------------------------------------------------------

/// ERC20 portal deposit header: `token (20) || sender (20) || amount (32)`.
/// Anything after the header is the execution-layer payload.
pub const ERC20_DEPOSIT_HEADER_LENGTH: usize = 2 * ADDRESS_LENGTH + ABI_WORD_LENGTH;

/// Address of the ERC20 portal on the devnet deployment,
/// `0xc700D6aDd016eECd59d989C028214Eaa0fCC0051`.
pub const ERC20_PORTAL_ADDRESS: Address = Address::new([
    0xc7, 0x00, 0xd6, 0xad, 0xd0, 0x16, 0xee, 0xcd, 0x59, 0xd9, 0x89, 0xc0, 0x28, 0x21, 0x4e, 0xaa,
    0x0f, 0xcc, 0x00, 0x51,
]);

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Where the rollup HTTP server listens inside the machine.
pub const DEFAULT_ROLLUP_HTTP_SERVER_URL: &str = "http://127.0.0.1:5004";

/// Default port of the local dev API server.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default port of the Prometheus endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9100;

/// Chain id stamped on synthetic inputs (the local devnet id).
pub const DEVNET_CHAIN_ID: u64 = 31337;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inputs whose `msg_sender` equals this address are decoded as ERC20
    /// portal deposits.
    pub erc20_portal: Address,
}

impl EngineConfig {
    /// Overrides the ERC20 portal address.
    pub fn with_erc20_portal(mut self, portal: Address) -> Self {
        self.erc20_portal = portal;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            erc20_portal: ERC20_PORTAL_ADDRESS,
        }
    }
}

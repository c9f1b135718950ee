// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rollbook Engine: Core Library
//!
//! A deterministic state-transition engine for rollup applications. The
//! engine owns an internal ERC20 ledger, feeds one input at a time to an
//! application callback, and returns the notices, vouchers and reports
//! that input produced. Either everything a cycle did is kept, or nothing
//! is.
//!
//! ## Architecture
//!
//! - **primitives**: Addresses, 256-bit amounts, hex serde adapters.
//! - **hash**: Keccak-256 for EVM compatibility, BLAKE3 for fingerprints.
//! - **config**: Constants: selectors, portal layout, default endpoints.
//! - **ledger**: Balances keyed by `(token, account)` plus a copy-on-write
//!   overlay used for the lifetime of one cycle.
//! - **voucher**: ERC20 `transfer` calldata for withdrawals.
//! - **outputs**: Notices, reports and the per-cycle output log.
//! - **input**: Metadata and decoding of portal deposits.
//! - **env**: The capability handles applications are given.
//! - **engine**: The cycle state machine: decode, execute, finalize.
//! - **tester**: In-process harness that drives the engine for tests.
//!
//! ## Design Rules
//!
//! 1. No floating point, no wrapping arithmetic. Every balance update is
//!    checked.
//! 2. Nothing inside a cycle touches committed state until the cycle
//!    finishes successfully.
//! 3. Inputs are processed strictly one after another.

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod hash;
pub mod input;
pub mod ledger;
pub mod outputs;
pub mod primitives;
pub mod tester;
pub mod voucher;

pub use config::EngineConfig;
pub use engine::{Application, CycleOutput, CycleState, Engine, InspectOutput};
pub use env::{Env, EnvInspector};
pub use error::{CycleError, ErrorKind};
pub use input::{Deposit, Erc20Deposit, Metadata, RawInput};
pub use ledger::{Balances, Ledger, LedgerError, LedgerOverlay};
pub use outputs::{Notice, Output, OutputLog, Report};
pub use primitives::{Address, AddressError, U256};
pub use tester::Tester;
pub use voucher::{Voucher, VoucherError};

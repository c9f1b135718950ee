//! # Test Harness
//!
//! Drives an [`Engine`] in-process, the way the rollup runtime would, but
//! without a node. The harness fills in metadata (input index, block number,
//! timestamp) so tests only state what matters: who sent what.
//!
//! ```
//! use rollbook_engine::engine::from_fn;
//! use rollbook_engine::{Address, Tester, U256};
//!
//! let app = from_fn(|env, _, _, payload| {
//!     env.notice(payload);
//!     Ok(())
//! });
//! let mut tester = Tester::new(app);
//! let out = tester.advance(Address::new([1; 20]), b"hello");
//! assert_eq!(out.notices()[0].payload, b"hello");
//! ```

use crate::config::{EngineConfig, DEVNET_CHAIN_ID};
use crate::engine::{Application, CycleOutput, Engine, InspectOutput};
use crate::input::{Erc20Deposit, Metadata, RawInput};
use crate::ledger::{Balances, Ledger};
use crate::primitives::{Address, U256};

/// First block number the harness reports.
const GENESIS_BLOCK: u64 = 1;

/// Timestamp of the first synthesised block.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Seconds between synthesised blocks.
const BLOCK_INTERVAL: u64 = 12;

/// In-process driver for an application.
#[derive(Debug)]
pub struct Tester<A> {
    engine: Engine<A>,
    next_input_index: u64,
}

impl<A: Application> Tester<A> {
    /// Harness with an empty ledger and the default portal.
    pub fn new(app: A) -> Self {
        Self::with_config(app, EngineConfig::default())
    }

    /// Harness with a custom engine configuration.
    pub fn with_config(app: A, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(app, config),
            next_input_index: 0,
        }
    }

    /// Harness over pre-seeded balances.
    pub fn with_ledger(app: A, ledger: Ledger) -> Self {
        Self {
            engine: Engine::with_ledger(app, EngineConfig::default(), ledger),
            next_input_index: 0,
        }
    }

    /// Sends an ERC20 deposit through the portal. `payload` becomes the
    /// deposit's execution-layer data.
    pub fn deposit_erc20(
        &mut self,
        token: Address,
        sender: Address,
        amount: U256,
        payload: &[u8],
    ) -> CycleOutput {
        let deposit = Erc20Deposit {
            token,
            sender,
            value: amount,
            exec_layer_data: payload.to_vec(),
        };
        let portal = self.engine.config().erc20_portal;
        self.advance(portal, &deposit.encode())
    }

    /// Sends a generic input from `sender`.
    pub fn advance(&mut self, sender: Address, payload: &[u8]) -> CycleOutput {
        let metadata = self.next_metadata(sender);
        self.engine.advance(RawInput {
            metadata,
            payload: payload.to_vec(),
        })
    }

    /// Sends a raw input exactly as given. The harness index still advances
    /// so later synthesised inputs do not reuse it.
    pub fn send(&mut self, raw: RawInput) -> CycleOutput {
        self.next_input_index = self
            .next_input_index
            .max(raw.metadata.input_index.saturating_add(1));
        self.engine.advance(raw)
    }

    /// Runs a read-only query.
    pub fn inspect(&mut self, payload: &[u8]) -> InspectOutput {
        self.engine.inspect(payload)
    }

    /// Metadata for the next input, consuming its index.
    fn next_metadata(&mut self, sender: Address) -> Metadata {
        let index = self.next_input_index;
        self.next_input_index = index.saturating_add(1);
        Metadata {
            chain_id: DEVNET_CHAIN_ID,
            app_contract: Address::ZERO,
            msg_sender: sender,
            input_index: index,
            block_number: GENESIS_BLOCK.saturating_add(index),
            block_timestamp: GENESIS_TIMESTAMP.saturating_add(index.saturating_mul(BLOCK_INTERVAL)),
        }
    }

    /// Committed balance.
    pub fn erc20_balance_of(&self, token: Address, account: Address) -> U256 {
        self.engine.ledger().balance_of(token, account)
    }

    pub fn ledger(&self) -> &Ledger {
        self.engine.ledger()
    }

    pub fn app(&self) -> &A {
        self.engine.app()
    }

    pub fn app_mut(&mut self) -> &mut A {
        self.engine.app_mut()
    }

    pub fn engine(&self) -> &Engine<A> {
        &self.engine
    }

    /// Index the next synthesised input will carry.
    pub fn next_input_index(&self) -> u64 {
        self.next_input_index
    }
}

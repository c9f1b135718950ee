//! # State-Transition Engine
//!
//! Runs one input at a time against the committed ledger:
//!
//! ```text
//! Idle -> Decoding -> Executing -> Finalizing -> Committed
//!            |            |             \------> RolledBack
//!            \------------+--------------------> RolledBack
//! ```
//!
//! - **Decoding**: classify the input; portal inputs must have the portal
//!   layout or the cycle ends here with `UnknownInputKind`.
//! - **Executing**: credit the deposit (if any) into the cycle overlay,
//!   then hand the application a [`CycleEnv`]. The first error aborts.
//! - **Finalizing**: on success merge the overlay and return the outputs;
//!   on failure drop the overlay and the outputs, keep the reports.
//!
//! Inspect calls bypass the state machine entirely: the application gets a
//! shared borrow of the committed ledger and cannot change it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::EngineConfig;
use crate::env::{CycleEnv, Env, EnvInspector, InspectEnv};
use crate::error::CycleError;
use crate::input::{Deposit, Input, Metadata, RawInput};
use crate::ledger::{Balances, Ledger};
use crate::outputs::{Notice, Output, OutputLog, Report};
use crate::voucher::Voucher;

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// The callback surface a rollup application implements.
pub trait Application {
    /// Processes one advance input.
    ///
    /// `deposit` is the decoded deposit when the input came through a
    /// portal; it has already been credited to the depositor. Returning an
    /// error rolls back every ledger change and output of the cycle.
    fn advance(
        &mut self,
        env: &mut dyn Env,
        metadata: &Metadata,
        deposit: Option<&Deposit>,
        payload: &[u8],
    ) -> Result<(), CycleError>;

    /// Answers a read-only query. Accepts silently unless overridden.
    fn inspect(&mut self, env: &mut dyn EnvInspector, payload: &[u8]) -> Result<(), CycleError> {
        let _ = (env, payload);
        Ok(())
    }
}

impl<A: Application + ?Sized> Application for Box<A> {
    fn advance(
        &mut self,
        env: &mut dyn Env,
        metadata: &Metadata,
        deposit: Option<&Deposit>,
        payload: &[u8],
    ) -> Result<(), CycleError> {
        (**self).advance(env, metadata, deposit, payload)
    }

    fn inspect(&mut self, env: &mut dyn EnvInspector, payload: &[u8]) -> Result<(), CycleError> {
        (**self).inspect(env, payload)
    }
}

/// An [`Application`] whose advance handler is a closure. Inspect accepts
/// silently.
pub struct FnApp<F>(F);

/// Wraps a closure as an [`Application`].
pub fn from_fn<F>(f: F) -> FnApp<F>
where
    F: FnMut(&mut dyn Env, &Metadata, Option<&Deposit>, &[u8]) -> Result<(), CycleError>,
{
    FnApp(f)
}

impl<F> Application for FnApp<F>
where
    F: FnMut(&mut dyn Env, &Metadata, Option<&Deposit>, &[u8]) -> Result<(), CycleError>,
{
    fn advance(
        &mut self,
        env: &mut dyn Env,
        metadata: &Metadata,
        deposit: Option<&Deposit>,
        payload: &[u8],
    ) -> Result<(), CycleError> {
        (self.0)(env, metadata, deposit, payload)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Where the last cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Decoding,
    Executing,
    Finalizing,
    Committed,
    RolledBack,
}

/// Everything one advance cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutput {
    /// Index of the input, when the input carried metadata.
    pub input_index: Option<u64>,
    /// Notices and vouchers in emission order. Empty on rollback.
    pub outputs: Vec<Output>,
    /// Diagnostic reports, kept on both paths.
    pub reports: Vec<Report>,
    /// Why the cycle rolled back, if it did.
    pub error: Option<CycleError>,
}

impl CycleOutput {
    /// `true` when the cycle committed.
    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }

    /// Runtime finish status: `"accept"` or `"reject"`.
    pub fn status(&self) -> &'static str {
        if self.is_accepted() {
            "accept"
        } else {
            "reject"
        }
    }

    /// Notices in emission order.
    pub fn notices(&self) -> Vec<&Notice> {
        self.outputs.iter().filter_map(Output::as_notice).collect()
    }

    /// Vouchers in emission order.
    pub fn vouchers(&self) -> Vec<&Voucher> {
        self.outputs.iter().filter_map(Output::as_voucher).collect()
    }
}

/// What an inspect call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectOutput {
    pub reports: Vec<Report>,
    pub error: Option<CycleError>,
}

impl InspectOutput {
    /// `true` when the application accepted the query.
    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }

    /// Runtime finish status: `"accept"` or `"reject"`.
    pub fn status(&self) -> &'static str {
        if self.is_accepted() {
            "accept"
        } else {
            "reject"
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the committed ledger and the application, and runs cycles against
/// them one at a time.
///
/// Lifecycle: [`Engine::new`] (or [`Engine::with_ledger`]), any number of
/// [`advance`](Engine::advance) / [`inspect`](Engine::inspect) calls, then
/// [`into_parts`](Engine::into_parts) to tear down.
#[derive(Debug)]
pub struct Engine<A> {
    app: A,
    config: EngineConfig,
    ledger: Ledger,
    last_state: CycleState,
    accepted: u64,
    rejected: u64,
}

impl<A: Application> Engine<A> {
    /// Creates an engine with an empty ledger.
    pub fn new(app: A, config: EngineConfig) -> Self {
        Self::with_ledger(app, config, Ledger::new())
    }

    /// Creates an engine on top of existing balances.
    pub fn with_ledger(app: A, config: EngineConfig, ledger: Ledger) -> Self {
        Self {
            app,
            config,
            ledger,
            last_state: CycleState::Idle,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Runs one advance cycle.
    pub fn advance(&mut self, raw: RawInput) -> CycleOutput {
        let input_index = raw.metadata.input_index;
        let span = info_span!("advance", input_index);
        let _guard = span.enter();

        self.last_state = CycleState::Decoding;
        let input = match Input::decode(raw, &self.config) {
            Ok(input) => input,
            Err(err) => return self.reject_with(Some(input_index), OutputLog::new(), err),
        };
        debug!(kind = input.kind(), sender = %input.metadata.msg_sender, "input decoded");

        self.last_state = CycleState::Executing;
        let mut env = CycleEnv::new(&self.ledger);
        let result = execute(&mut self.app, &mut env, &input);

        self.last_state = CycleState::Finalizing;
        let (overlay, log) = env.finish();
        match result {
            Ok(()) => {
                let changes = overlay.into_changeset();
                let written = changes.len();
                self.ledger.apply(changes);
                self.accepted += 1;
                self.last_state = CycleState::Committed;

                let (outputs, reports) = log.into_parts();
                info!(
                    outputs = outputs.len(),
                    reports = reports.len(),
                    written,
                    digest = %self.ledger.digest_hex(),
                    "cycle committed"
                );
                CycleOutput {
                    input_index: Some(input_index),
                    outputs,
                    reports,
                    error: None,
                }
            }
            Err(err) => {
                drop(overlay);
                self.reject_with(Some(input_index), log, err)
            }
        }
    }

    /// Rejects an input whose kind the caller could not even hand to
    /// [`advance`](Self::advance), such as an unknown runtime request type.
    /// Emits one report naming the kind.
    pub fn reject_unknown(&mut self, kind: impl Into<String>) -> CycleOutput {
        self.last_state = CycleState::Decoding;
        self.reject_with(None, OutputLog::new(), CycleError::unknown_kind(kind))
    }

    /// Runs a read-only query against the committed ledger.
    pub fn inspect(&mut self, payload: &[u8]) -> InspectOutput {
        let mut env = InspectEnv::new(&self.ledger);
        let result = self.app.inspect(&mut env, payload);
        let reports = env.into_reports();

        match result {
            Ok(()) => {
                debug!(reports = reports.len(), "inspect accepted");
                InspectOutput {
                    reports,
                    error: None,
                }
            }
            Err(err) => {
                warn!(error = %err, "inspect rejected");
                InspectOutput {
                    reports,
                    error: Some(err),
                }
            }
        }
    }

    /// Rollback path shared by every failure. Outputs are dropped and an
    /// unknown-kind failure always gets a report naming the kind.
    fn reject_with(
        &mut self,
        input_index: Option<u64>,
        mut log: OutputLog,
        err: CycleError,
    ) -> CycleOutput {
        log.discard_outputs();
        if matches!(err, CycleError::UnknownInputKind { .. }) {
            log.report(err.to_string().into_bytes());
        }
        self.rejected += 1;
        self.last_state = CycleState::RolledBack;

        warn!(kind = %err.kind(), error = %err, "cycle rolled back");
        let (_, reports) = log.into_parts();
        CycleOutput {
            input_index,
            outputs: Vec::new(),
            reports,
            error: Some(err),
        }
    }

    /// Committed balances.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The configuration the engine decodes inputs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The application.
    pub fn app(&self) -> &A {
        &self.app
    }

    /// Mutable access to the application between cycles.
    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Terminal state of the most recent cycle, or `Idle` before the first.
    pub fn last_state(&self) -> CycleState {
        self.last_state
    }

    /// Number of committed cycles.
    pub fn accepted_inputs(&self) -> u64 {
        self.accepted
    }

    /// Number of rolled-back cycles.
    pub fn rejected_inputs(&self) -> u64 {
        self.rejected
    }

    /// Committed plus rolled-back cycles.
    pub fn processed_inputs(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Tears the engine down.
    pub fn into_parts(self) -> (A, Ledger) {
        (self.app, self.ledger)
    }
}

/// Credits the deposit, then runs the application.
fn execute<A: Application>(
    app: &mut A,
    env: &mut CycleEnv<'_>,
    input: &Input,
) -> Result<(), CycleError> {
    match &input.deposit {
        Some(Deposit::Erc20(deposit)) => {
            env.ledger_mut()
                .deposit(deposit.token, deposit.sender, deposit.value)?;
            debug!(
                token = %deposit.token,
                sender = %deposit.sender,
                value = %deposit.value,
                "erc20 deposit credited"
            );
        }
        None => {}
    }
    app.advance(env, &input.metadata, input.deposit.as_ref(), &input.payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

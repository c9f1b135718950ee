//! # Environment Handles
//!
//! Applications never see the ledger or the output log directly. During a
//! cycle they get an [`Env`]; during an inspect they get an
//! [`EnvInspector`], which can read balances and report but not mutate.
//!
//! Both traits are object safe so applications take `&mut dyn Env` and the
//! engine is free to change what sits behind it.

use tracing::debug;

use crate::error::CycleError;
use crate::ledger::{Balances, Ledger, LedgerOverlay};
use crate::outputs::{OutputLog, Report};
use crate::primitives::{Address, U256};
use crate::voucher::Voucher;

/// Read-only capabilities.
pub trait EnvInspector {
    /// Balance of `account` in `token`, as of this point in the cycle.
    fn erc20_balance_of(&self, token: Address, account: Address) -> U256;

    /// Appends a diagnostic report.
    fn report(&mut self, payload: &[u8]);
}

/// Capabilities available while executing an advance input.
pub trait Env: EnvInspector {
    /// Appends a notice. Returns its position in the cycle's outputs.
    fn notice(&mut self, payload: &[u8]) -> usize;

    /// Appends an arbitrary voucher. Returns its position in the cycle's
    /// outputs.
    fn voucher(&mut self, destination: Address, value: U256, payload: &[u8]) -> usize;

    /// Moves tokens between two rollup accounts.
    fn erc20_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), CycleError>;

    /// Debits `account` and emits the withdrawal voucher. Returns the
    /// voucher's position in the cycle's outputs.
    fn erc20_withdraw(
        &mut self,
        token: Address,
        account: Address,
        value: U256,
    ) -> Result<usize, CycleError>;
}

// ---------------------------------------------------------------------------
// CycleEnv
// ---------------------------------------------------------------------------

/// The [`Env`] behind an advance cycle: the cycle's ledger overlay and its
/// output log.
#[derive(Debug)]
pub struct CycleEnv<'a> {
    ledger: LedgerOverlay<'a>,
    log: OutputLog,
}

impl<'a> CycleEnv<'a> {
    /// Opens a cycle over the committed ledger.
    pub fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger: ledger.overlay(),
            log: OutputLog::new(),
        }
    }

    /// Direct access to the overlay, for the engine's own bookkeeping
    /// (crediting deposits before the application runs).
    pub fn ledger_mut(&mut self) -> &mut LedgerOverlay<'a> {
        &mut self.ledger
    }

    /// Outputs and reports collected so far.
    pub fn log(&self) -> &OutputLog {
        &self.log
    }

    /// Ends the cycle, returning the overlay and the log.
    pub fn finish(self) -> (LedgerOverlay<'a>, OutputLog) {
        (self.ledger, self.log)
    }
}

impl EnvInspector for CycleEnv<'_> {
    fn erc20_balance_of(&self, token: Address, account: Address) -> U256 {
        self.ledger.balance_of(token, account)
    }

    fn report(&mut self, payload: &[u8]) {
        self.log.report(payload.to_vec());
    }
}

impl Env for CycleEnv<'_> {
    fn notice(&mut self, payload: &[u8]) -> usize {
        self.log.notice(payload.to_vec())
    }

    fn voucher(&mut self, destination: Address, value: U256, payload: &[u8]) -> usize {
        self.log
            .voucher(Voucher::new(destination, value, payload.to_vec()))
    }

    fn erc20_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), CycleError> {
        self.ledger.transfer(token, from, to, value)?;
        debug!(%token, %from, %to, %value, "erc20 transfer");
        Ok(())
    }

    fn erc20_withdraw(
        &mut self,
        token: Address,
        account: Address,
        value: U256,
    ) -> Result<usize, CycleError> {
        self.ledger.withdraw(token, account, value)?;
        let position = self
            .log
            .voucher(Voucher::erc20_withdrawal(token, account, value));
        debug!(%token, %account, %value, position, "erc20 withdraw");
        Ok(position)
    }
}

// ---------------------------------------------------------------------------
// InspectEnv
// ---------------------------------------------------------------------------

/// The [`EnvInspector`] behind an inspect call: a shared borrow of the
/// committed ledger, so mutation is impossible by construction.
#[derive(Debug)]
pub struct InspectEnv<'a> {
    ledger: &'a Ledger,
    reports: Vec<Report>,
}

impl<'a> InspectEnv<'a> {
    /// Opens an inspect session over the committed ledger.
    pub fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger,
            reports: Vec::new(),
        }
    }

    /// Ends the session, returning its reports.
    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }
}

impl EnvInspector for InspectEnv<'_> {
    fn erc20_balance_of(&self, token: Address, account: Address) -> U256 {
        self.ledger.balance_of(token, account)
    }

    fn report(&mut self, payload: &[u8]) {
        self.reports.push(Report {
            payload: payload.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::outputs::Output;

    fn token() -> Address {
        Address::new([0xA0; 20])
    }

    fn alice() -> Address {
        Address::new([0x01; 20])
    }

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), U256::from(100u64)).unwrap();
        ledger
    }

    #[test]
    fn withdraw_debits_and_emits_voucher() {
        let ledger = funded_ledger();
        let mut env = CycleEnv::new(&ledger);

        env.notice(b"before");
        let position = env.erc20_withdraw(token(), alice(), U256::from(40u64)).unwrap();

        assert_eq!(position, 1);
        assert_eq!(env.erc20_balance_of(token(), alice()), U256::from(60u64));
        match &env.log().outputs()[1] {
            Output::Voucher(v) => assert_eq!(v.destination, token()),
            other => panic!("expected voucher, got {other:?}"),
        }
    }

    #[test]
    fn failed_withdraw_emits_nothing() {
        let ledger = funded_ledger();
        let mut env = CycleEnv::new(&ledger);

        let err = env
            .erc20_withdraw(token(), alice(), U256::from(101u64))
            .unwrap_err();
        assert!(matches!(
            err,
            CycleError::Ledger(LedgerError::InsufficientBalance { .. })
        ));
        assert!(env.log().outputs().is_empty());
        assert_eq!(env.erc20_balance_of(token(), alice()), U256::from(100u64));
    }

    #[test]
    fn raw_voucher_is_recorded_verbatim() {
        let ledger = Ledger::new();
        let mut env = CycleEnv::new(&ledger);
        env.voucher(alice(), U256::from(7u64), &[1, 2, 3]);

        let (_, log) = env.finish();
        let (outputs, _) = log.into_parts();
        assert_eq!(
            outputs,
            vec![Output::Voucher(Voucher::new(alice(), U256::from(7u64), vec![1, 2, 3]))]
        );
    }

    #[test]
    fn inspector_reads_committed_balances() {
        let ledger = funded_ledger();
        let mut env = InspectEnv::new(&ledger);
        assert_eq!(env.erc20_balance_of(token(), alice()), U256::from(100u64));
        env.report(b"ok");
        assert_eq!(env.into_reports().len(), 1);
    }
}

//! Integration tests for cycle atomicity.
//!
//! Every test drives the engine through the public harness only: inputs go
//! in, `CycleOutput`s come out, and the committed ledger is compared before
//! and after. A cycle either lands completely or leaves no trace apart from
//! its reports.

use rollbook_engine::engine::from_fn;
use rollbook_engine::ledger::{Balances, Ledger, LedgerError};
use rollbook_engine::voucher::decode_erc20_transfer;
use rollbook_engine::{
    Address, CycleError, CycleState, Deposit, Env, ErrorKind, Metadata, RawInput, Tester, U256,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn token() -> Address {
    "0xa0Ee7A142d267C1f36714E4a8F75612F20a79720".parse().unwrap()
}

fn alice() -> Address {
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
}

fn bob() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

/// Payload commands: `pay:<decimal>` moves from alice to bob, `out:<decimal>`
/// withdraws from alice. Commands run in order; the first failure aborts.
fn scripted(
    env: &mut dyn Env,
    _: &Metadata,
    _: Option<&Deposit>,
    payload: &[u8],
) -> Result<(), CycleError> {
    let script = String::from_utf8_lossy(payload);
    for command in script.split(';').filter(|c| !c.is_empty()) {
        env.report(command.as_bytes());
        let (op, amount) = command
            .split_once(':')
            .ok_or_else(|| CycleError::Rejected(format!("bad command {command}")))?;
        let amount = U256::from_dec_str(amount)
            .map_err(|_| CycleError::Rejected(format!("bad amount {amount}")))?;
        match op {
            "pay" => {
                env.erc20_transfer(token(), alice(), bob(), amount)?;
                env.notice(format!("paid {amount}").as_bytes());
            }
            "out" => {
                env.erc20_withdraw(token(), alice(), amount)?;
            }
            other => return Err(CycleError::Rejected(format!("bad op {other}"))),
        }
    }
    Ok(())
}

fn funded(amount: u64) -> Tester<impl rollbook_engine::Application> {
    let mut ledger = Ledger::new();
    ledger.deposit(token(), alice(), U256::from(amount)).unwrap();
    Tester::with_ledger(from_fn(scripted), ledger)
}

// ---- Commit Tests ----

#[test]
fn multi_step_cycle_commits_every_change() {
    let mut tester = funded(100);

    let out = tester.advance(bob(), b"pay:30;out:50");
    assert!(out.is_accepted());
    assert_eq!(out.notices().len(), 1);
    assert_eq!(out.vouchers().len(), 1);
    assert_eq!(out.reports.len(), 2);

    assert_eq!(tester.erc20_balance_of(token(), alice()), U256::from(20u64));
    assert_eq!(tester.erc20_balance_of(token(), bob()), U256::from(30u64));
    assert_eq!(tester.ledger().total_supply(token()), U256::from(50u64));
    assert_eq!(tester.engine().last_state(), CycleState::Committed);
}

#[test]
fn withdraw_voucher_carries_the_transfer_call() {
    let mut tester = funded(100);
    let out = tester.advance(bob(), b"out:100");

    let voucher = out.vouchers()[0];
    assert_eq!(voucher.destination, token());
    assert_eq!(voucher.value, U256::zero());
    assert_eq!(
        decode_erc20_transfer(&voucher.payload).unwrap(),
        (alice(), U256::from(100u64))
    );
    assert!(tester.ledger().is_empty());
}

// ---- Rollback Tests ----

#[test]
fn late_failure_undoes_earlier_steps() {
    let mut tester = funded(100);
    let before = tester.ledger().digest();

    let out = tester.advance(bob(), b"pay:30;out:50;out:21");
    assert!(!out.is_accepted());
    assert!(out.outputs.is_empty());
    // Reports from all three commands survive.
    assert_eq!(out.reports.len(), 3);
    assert_eq!(
        out.error,
        Some(CycleError::Ledger(LedgerError::InsufficientBalance {
            token: token(),
            account: alice(),
            available: U256::from(20u64),
            requested: U256::from(21u64),
        }))
    );

    assert_eq!(tester.ledger().digest(), before);
    assert_eq!(tester.erc20_balance_of(token(), bob()), U256::zero());
    assert_eq!(tester.engine().last_state(), CycleState::RolledBack);
}

#[test]
fn rolled_back_deposit_is_not_credited() {
    let mut tester = Tester::new(from_fn(scripted));

    let out = tester.deposit_erc20(token(), alice(), U256::from(10u64), b"out:11");
    assert_eq!(out.error.as_ref().map(CycleError::kind), Some(ErrorKind::InsufficientBalance));
    assert!(tester.ledger().is_empty());

    let out = tester.deposit_erc20(token(), alice(), U256::from(10u64), b"out:4");
    assert!(out.is_accepted());
    assert_eq!(tester.erc20_balance_of(token(), alice()), U256::from(6u64));
}

#[test]
fn overflowing_deposit_rolls_back() {
    let mut tester = funded(1);
    let before = tester.ledger().clone();

    let out = tester.deposit_erc20(token(), alice(), U256::MAX, b"");
    assert_eq!(out.error.as_ref().map(CycleError::kind), Some(ErrorKind::Overflow));
    assert_eq!(tester.ledger(), &before);
}

#[test]
fn application_refusal_rolls_back() {
    let mut tester = funded(100);
    let out = tester.advance(bob(), b"pay:1;burn:1");
    assert_eq!(out.error, Some(CycleError::Rejected("bad op burn".into())));
    assert_eq!(tester.erc20_balance_of(token(), alice()), U256::from(100u64));
}

// ---- Decoding Tests ----

#[test]
fn truncated_portal_input_touches_nothing() {
    let mut tester = funded(100);
    let before = tester.ledger().digest();
    let portal = tester.engine().config().erc20_portal;

    let out = tester.send(RawInput {
        metadata: Metadata {
            msg_sender: portal,
            input_index: 0,
            ..Default::default()
        },
        payload: vec![0u8; 71],
    });

    assert_eq!(out.error.as_ref().map(CycleError::kind), Some(ErrorKind::UnknownInputKind));
    assert_eq!(out.reports.len(), 1);
    assert!(out.notices().is_empty());
    assert!(out.vouchers().is_empty());
    assert_eq!(tester.ledger().digest(), before);
}

#[test]
fn later_cycles_see_only_committed_state() {
    let mut tester = funded(100);
    tester.advance(bob(), b"pay:60;out:50");
    let out = tester.advance(bob(), b"pay:60");

    assert!(out.is_accepted());
    assert_eq!(tester.erc20_balance_of(token(), bob()), U256::from(60u64));
    assert_eq!(tester.erc20_balance_of(token(), alice()), U256::from(40u64));
}

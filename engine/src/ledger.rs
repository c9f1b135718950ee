//! # ERC20 Ledger
//!
//! Internal balances of every token the rollup holds, keyed by
//! `(token, account)`. Tokens enter through portal deposits, move between
//! accounts with transfers, and leave with withdrawals, each of which is
//! paired with a voucher by the caller.
//!
//! Two stores implement the same [`Balances`] trait:
//!
//! - [`Ledger`]: the committed state, owned by the engine across cycles.
//! - [`LedgerOverlay`]: a copy-on-write view over a borrowed `Ledger`
//!   that collects one cycle's writes. Dropping it is the rollback;
//!   [`Ledger::apply`] with its changeset is the commit.
//!
//! All arithmetic lives in the provided trait methods, so both stores
//! enforce identical rules.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::hash::blake3_hash;
use crate::primitives::{u256_to_be_bytes, Address, U256};

/// Ledger key: `(token, account)`.
pub type BalanceKey = (Address, Address);

/// Pending writes produced by a [`LedgerOverlay`]. Zero values are real
/// entries here: they shadow non-zero balances in the base ledger.
pub type Changeset = BTreeMap<BalanceKey, U256>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Attempted to move more than the account holds.
    #[error(
        "insufficient balance: {account} holds {available} of token {token}, requested {requested}"
    )]
    InsufficientBalance {
        /// Token being debited.
        token: Address,
        /// Account being debited.
        account: Address,
        /// Balance at the time of the request.
        available: U256,
        /// Amount requested.
        requested: U256,
    },

    /// Crediting would push a balance past `2^256 - 1`.
    #[error("balance overflow: {account} holds {current} of token {token}, credit {amount}")]
    Overflow {
        /// Token being credited.
        token: Address,
        /// Account being credited.
        account: Address,
        /// Balance before the failed credit.
        current: U256,
        /// Amount that caused the overflow.
        amount: U256,
    },
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Balance store with checked deposit, transfer and withdraw.
///
/// Implementors supply raw reads and writes; the provided methods enforce
/// the invariants. Every provided method validates before it writes, so a
/// failed call leaves the store untouched.
pub trait Balances {
    /// Current balance. Unseen entries are zero.
    fn balance_of(&self, token: Address, account: Address) -> U256;

    /// Overwrites a balance. No checks.
    fn set_balance(&mut self, token: Address, account: Address, amount: U256);

    /// Credits `amount` and returns the new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the result does not fit in 256 bits.
    fn deposit(&mut self, token: Address, account: Address, amount: U256) -> Result<U256, LedgerError> {
        let current = self.balance_of(token, account);
        let updated = current.checked_add(amount).ok_or(LedgerError::Overflow {
            token,
            account,
            current,
            amount,
        })?;
        self.set_balance(token, account, updated);
        Ok(updated)
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Sending to the zero address is allowed. Sending to yourself is a
    /// checked no-op.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if `from` holds less than
    /// `amount`; [`LedgerError::Overflow`] if `to` would overflow.
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                account: from,
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let current = self.balance_of(token, to);
        let credited = current.checked_add(amount).ok_or(LedgerError::Overflow {
            token,
            account: to,
            current,
            amount,
        })?;

        self.set_balance(token, from, available - amount);
        self.set_balance(token, to, credited);
        Ok(())
    }

    /// Debits `amount` from `account` and returns what is left. The funds
    /// leave the ledger; emitting the matching voucher is the caller's job.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if the account holds less than
    /// `amount`.
    fn withdraw(&mut self, token: Address, account: Address, amount: U256) -> Result<U256, LedgerError> {
        let available = self.balance_of(token, account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                account,
                available,
                requested: amount,
            });
        }
        let remaining = available - amount;
        self.set_balance(token, account, remaining);
        Ok(remaining)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Committed balances.
///
/// A `BTreeMap` rather than a `HashMap` so iteration order, and with it
/// [`digest`](Self::digest), is the same on every run. Zero balances are
/// never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: BTreeMap<BalanceKey, U256>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a copy-on-write view for one cycle.
    pub fn overlay(&self) -> LedgerOverlay<'_> {
        LedgerOverlay::new(self)
    }

    /// Merges a cycle's writes. Zero balances are dropped.
    pub fn apply(&mut self, changes: Changeset) {
        for ((token, account), amount) in changes {
            self.set_balance(token, account, amount);
        }
    }

    /// Sum of all balances of `token`.
    ///
    /// Saturates at `U256::MAX`; individual balances cannot overflow but
    /// their sum across accounts can.
    pub fn total_supply(&self, token: Address) -> U256 {
        self.balances
            .iter()
            .filter(|((t, _), _)| *t == token)
            .fold(U256::zero(), |acc, (_, amount)| acc.saturating_add(*amount))
    }

    /// Accounts with a non-zero balance of `token`, in address order.
    pub fn holders(&self, token: Address) -> Vec<(Address, U256)> {
        self.balances
            .iter()
            .filter(|((t, _), _)| *t == token)
            .map(|((_, account), amount)| (*account, *amount))
            .collect()
    }

    /// Distinct tokens with at least one non-zero balance, in address order.
    pub fn tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.balances.keys().map(|(t, _)| *t).collect();
        tokens.dedup();
        tokens
    }

    /// All non-zero entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&BalanceKey, &U256)> {
        self.balances.iter()
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// `true` when no account holds anything.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// BLAKE3 fingerprint of the committed state.
    ///
    /// Hashes `token || account || amount_be32` for every entry in key
    /// order. Two ledgers with the same balances have the same digest.
    pub fn digest(&self) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(self.balances.len() * 72);
        for ((token, account), amount) in &self.balances {
            preimage.extend_from_slice(token.as_bytes());
            preimage.extend_from_slice(account.as_bytes());
            preimage.extend_from_slice(&u256_to_be_bytes(amount));
        }
        blake3_hash(&preimage)
    }

    /// Hex-encoded [`digest`](Self::digest).
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

impl Balances for Ledger {
    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, token: Address, account: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&(token, account));
        } else {
            self.balances.insert((token, account), amount);
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerOverlay
// ---------------------------------------------------------------------------

/// One cycle's view of the ledger.
///
/// Reads check the overlay first, then the base. Writes only ever touch
/// the overlay, so the base stays exactly as it was until the engine
/// applies the changeset.
#[derive(Debug)]
pub struct LedgerOverlay<'a> {
    base: &'a Ledger,
    writes: Changeset,
}

impl<'a> LedgerOverlay<'a> {
    /// Wraps a committed ledger.
    pub fn new(base: &'a Ledger) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// The committed ledger underneath.
    pub fn base(&self) -> &Ledger {
        self.base
    }

    /// Number of entries written so far.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Consumes the overlay and returns its writes.
    pub fn into_changeset(self) -> Changeset {
        self.writes
    }
}

impl Balances for LedgerOverlay<'_> {
    fn balance_of(&self, token: Address, account: Address) -> U256 {
        match self.writes.get(&(token, account)) {
            Some(amount) => *amount,
            None => self.base.balance_of(token, account),
        }
    }

    fn set_balance(&mut self, token: Address, account: Address, amount: U256) {
        self.writes.insert((token, account), amount);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Address {
        Address::new([0xA0; 20])
    }

    fn alice() -> Address {
        Address::new([0x01; 20])
    }

    fn bob() -> Address {
        Address::new([0x02; 20])
    }

    fn units(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn deposit_on_zero_balance_sets_amount() {
        let mut ledger = Ledger::new();
        let balance = ledger.deposit(token(), alice(), units(10_000)).unwrap();
        assert_eq!(balance, units(10_000));
        assert_eq!(ledger.balance_of(token(), alice()), units(10_000));
    }

    #[test]
    fn unseen_entry_is_zero() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance_of(token(), alice()), U256::zero());
    }

    #[test]
    fn deposit_accumulates() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(500)).unwrap();
        ledger.deposit(token(), alice(), units(300)).unwrap();
        assert_eq!(ledger.balance_of(token(), alice()), units(800));
    }

    #[test]
    fn deposit_overflow_rejected_and_balance_kept() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), U256::MAX).unwrap();
        let err = ledger.deposit(token(), alice(), units(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { .. }));
        assert_eq!(ledger.balance_of(token(), alice()), U256::MAX);
    }

    #[test]
    fn transfer_moves_exact_amount() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(1_000)).unwrap();
        ledger.transfer(token(), alice(), bob(), units(400)).unwrap();

        assert_eq!(ledger.balance_of(token(), alice()), units(600));
        assert_eq!(ledger.balance_of(token(), bob()), units(400));
        assert_eq!(ledger.total_supply(token()), units(1_000));
    }

    #[test]
    fn transfer_to_zero_address_accumulates() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(10_000)).unwrap();
        ledger
            .transfer(token(), alice(), Address::ZERO, units(10_000))
            .unwrap();
        assert_eq!(ledger.balance_of(token(), Address::ZERO), units(10_000));
        assert_eq!(ledger.balance_of(token(), alice()), U256::zero());
    }

    #[test]
    fn transfer_insufficient_balance_changes_nothing() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(100)).unwrap();
        let before = ledger.clone();

        let err = ledger
            .transfer(token(), alice(), bob(), units(200))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                token: token(),
                account: alice(),
                available: units(100),
                requested: units(200),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_recipient_overflow_changes_nothing() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(5)).unwrap();
        ledger.deposit(token(), bob(), U256::MAX).unwrap();
        let before = ledger.clone();

        let err = ledger.transfer(token(), alice(), bob(), units(5)).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { account, .. } if account == bob()));
        assert_eq!(ledger, before);
    }

    #[test]
    fn self_transfer_is_checked_noop() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(10)).unwrap();
        ledger.transfer(token(), alice(), alice(), units(10)).unwrap();
        assert_eq!(ledger.balance_of(token(), alice()), units(10));
        assert!(ledger.transfer(token(), alice(), alice(), units(11)).is_err());
    }

    #[test]
    fn withdraw_removes_from_supply() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(1_000)).unwrap();
        let remaining = ledger.withdraw(token(), alice(), units(250)).unwrap();

        assert_eq!(remaining, units(750));
        assert_eq!(ledger.total_supply(token()), units(750));
    }

    #[test]
    fn withdraw_to_zero_drops_entry() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(1_000)).unwrap();
        ledger.withdraw(token(), alice(), units(1_000)).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn withdraw_insufficient_balance_rejected() {
        let mut ledger = Ledger::new();
        let err = ledger.withdraw(token(), alice(), units(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn overlay_reads_through_and_leaves_base_alone() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(100)).unwrap();

        let mut overlay = ledger.overlay();
        overlay.transfer(token(), alice(), bob(), units(100)).unwrap();
        assert_eq!(overlay.balance_of(token(), alice()), U256::zero());
        assert_eq!(overlay.balance_of(token(), bob()), units(100));
        assert_eq!(overlay.base().balance_of(token(), alice()), units(100));
        assert_eq!(overlay.pending_writes(), 2);
    }

    #[test]
    fn dropped_overlay_is_a_rollback() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(100)).unwrap();
        let digest = ledger.digest();

        {
            let mut overlay = ledger.overlay();
            overlay.withdraw(token(), alice(), units(60)).unwrap();
        }

        assert_eq!(ledger.digest(), digest);
    }

    #[test]
    fn applied_changeset_is_a_commit() {
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(100)).unwrap();

        let changes = {
            let mut overlay = ledger.overlay();
            overlay.transfer(token(), alice(), bob(), units(100)).unwrap();
            overlay.into_changeset()
        };
        ledger.apply(changes);

        assert_eq!(ledger.balance_of(token(), bob()), units(100));
        assert_eq!(ledger.holders(token()), vec![(bob(), units(100))]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn digest_depends_only_on_balances() {
        let mut a = Ledger::new();
        a.deposit(token(), alice(), units(1)).unwrap();
        a.deposit(token(), bob(), units(2)).unwrap();

        let mut b = Ledger::new();
        b.deposit(token(), bob(), units(2)).unwrap();
        b.deposit(token(), alice(), units(5)).unwrap();
        b.withdraw(token(), alice(), units(4)).unwrap();

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), Ledger::new().digest());
    }

    #[test]
    fn tokens_are_listed_once() {
        let other = Address::new([0xB0; 20]);
        let mut ledger = Ledger::new();
        ledger.deposit(token(), alice(), units(1)).unwrap();
        ledger.deposit(token(), bob(), units(1)).unwrap();
        ledger.deposit(other, alice(), units(1)).unwrap();
        assert_eq!(ledger.tokens(), vec![token(), other]);
    }
}

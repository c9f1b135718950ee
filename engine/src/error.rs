//! Error types for the state-transition engine.
//!
//! Every way a cycle can fail is a [`CycleError`]. A failed cycle never
//! changes committed state; the error travels back to the caller together
//! with the reports emitted before the failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Why a cycle was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// The input has a shape or kind the engine or application does not
    /// recognise.
    #[error("unknown input kind: {kind}")]
    UnknownInputKind {
        /// Human-readable description of what arrived.
        kind: String,
    },

    /// A ledger operation failed (insufficient balance, overflow).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The application refused the input for its own reasons.
    #[error("input rejected: {0}")]
    Rejected(String),
}

impl CycleError {
    /// Shorthand for [`CycleError::UnknownInputKind`].
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        CycleError::UnknownInputKind { kind: kind.into() }
    }

    /// Flat classification for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CycleError::UnknownInputKind { .. } => ErrorKind::UnknownInputKind,
            CycleError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            CycleError::Ledger(LedgerError::Overflow { .. }) => ErrorKind::Overflow,
            CycleError::Rejected(_) => ErrorKind::Rejected,
        }
    }
}

/// Structured error category, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownInputKind,
    InsufficientBalance,
    Overflow,
    Rejected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnknownInputKind => "unknown_input_kind",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, U256};

    #[test]
    fn ledger_errors_keep_their_kind() {
        let err: CycleError = LedgerError::InsufficientBalance {
            token: Address::ZERO,
            account: Address::ZERO,
            available: U256::zero(),
            requested: U256::one(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(err.to_string().starts_with("insufficient balance"));
    }

    #[test]
    fn unknown_kind_message() {
        let err = CycleError::unknown_kind("ether deposit");
        assert_eq!(err.kind(), ErrorKind::UnknownInputKind);
        assert_eq!(err.to_string(), "unknown input kind: ether deposit");
        assert_eq!(ErrorKind::Overflow.to_string(), "overflow");
    }
}

//! # ERC20 Round-trip
//!
//! On every ERC20 deposit the application walks the funds around the
//! ledger and back out again:
//!
//! 1. transfer the deposit from the depositor to the zero address,
//! 2. transfer it back,
//! 3. withdraw it, producing a `transfer(address,uint256)` voucher.
//!
//! A notice with the relevant balance precedes each step and one more
//! follows the withdraw, so the four notices tell the whole story.
//! Anything other than an ERC20 deposit is refused.
//!
//! Inspect answers `erc20/<token>/<account>` with the committed balance.

use rollbook_engine::{Address, Application, CycleError, Deposit, Env, EnvInspector, Metadata};
use tracing::debug;

/// Prefix of the balance query understood by [`Erc20RoundtripApp::inspect`].
pub const BALANCE_QUERY_PREFIX: &str = "erc20/";

/// The round-trip application. Stateless; all state lives in the ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc20RoundtripApp;

impl Erc20RoundtripApp {
    pub fn new() -> Self {
        Self
    }
}

impl Application for Erc20RoundtripApp {
    fn advance(
        &mut self,
        env: &mut dyn Env,
        metadata: &Metadata,
        deposit: Option<&Deposit>,
        _payload: &[u8],
    ) -> Result<(), CycleError> {
        // The engine reports the kind when the cycle rolls back.
        let deposit = match deposit {
            Some(Deposit::Erc20(deposit)) => deposit,
            None => return Err(CycleError::unknown_kind("generic")),
            Some(other) => return Err(CycleError::unknown_kind(other.kind())),
        };

        let token = deposit.token;
        let sender = deposit.sender;
        let zero = Address::ZERO;
        debug!(input_index = metadata.input_index, %token, %sender, "round-trip start");

        let balance = env.erc20_balance_of(token, sender);
        env.notice(
            format!("1 - ERC20 balance of {sender}: {balance} before transfer to {zero}").as_bytes(),
        );
        env.erc20_transfer(token, sender, zero, deposit.value)?;

        let balance = env.erc20_balance_of(token, zero);
        env.notice(format!("2 - Balance of {zero}: {balance} before transfer to {sender}").as_bytes());
        env.erc20_transfer(token, zero, sender, deposit.value)?;

        let balance = env.erc20_balance_of(token, sender);
        env.notice(format!("3 - ERC20 balance of {sender}: {balance} before withdraw").as_bytes());
        env.erc20_withdraw(token, sender, deposit.value)?;

        let balance = env.erc20_balance_of(token, sender);
        env.notice(format!("4 - ERC20 balance of {sender}: {balance} after withdraw").as_bytes());
        Ok(())
    }

    fn inspect(&mut self, env: &mut dyn EnvInspector, payload: &[u8]) -> Result<(), CycleError> {
        match parse_balance_query(payload) {
            Some((token, account)) => {
                let balance = env.erc20_balance_of(token, account);
                env.report(balance.to_string().as_bytes());
                Ok(())
            }
            None => {
                let query = String::from_utf8_lossy(payload);
                env.report(format!("unsupported query: {query}").as_bytes());
                Err(CycleError::Rejected(format!("unsupported query: {query}")))
            }
        }
    }
}

/// Parses `erc20/<token>/<account>`.
fn parse_balance_query(payload: &[u8]) -> Option<(Address, Address)> {
    let query = std::str::from_utf8(payload).ok()?;
    let rest = query.trim().strip_prefix(BALANCE_QUERY_PREFIX)?;
    let (token, account) = rest.split_once('/')?;
    Some((token.parse().ok()?, account.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_query_parses_both_addresses() {
        let query = b"erc20/0xa0Ee7A142d267C1f36714E4a8F75612F20a79720/0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
        let (token, account) = parse_balance_query(query).unwrap();
        assert_eq!(token.to_checksum(), "0xa0Ee7A142d267C1f36714E4a8F75612F20a79720");
        assert_eq!(account.to_checksum(), "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    }

    #[test]
    fn malformed_queries_are_rejected() {
        assert!(parse_balance_query(b"erc20/0x01").is_none());
        assert!(parse_balance_query(b"erc721/0x01/0x02").is_none());
        assert!(parse_balance_query(&[0xff, 0xfe]).is_none());
    }
}

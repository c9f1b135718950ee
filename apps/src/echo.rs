//! # Echo
//!
//! The starter application: refunds ERC20 deposits and echoes text.
//!
//! | Input                       | Result                                           |
//! |-----------------------------|--------------------------------------------------|
//! | ERC20 deposit, amount 0     | report, no voucher                               |
//! | ERC20 deposit, amount > 0   | withdraw to depositor (voucher) plus a notice    |
//! | UTF-8 payload               | notice `Received input: <text>`                  |
//! | anything else               | report `Unknown input format from <sender>`      |
//!
//! Every case is accepted. Inspect echoes the query back as a report.

use rollbook_engine::{Application, CycleError, Deposit, Env, EnvInspector, Metadata};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoApp;

impl EchoApp {
    pub fn new() -> Self {
        Self
    }
}

impl Application for EchoApp {
    fn advance(
        &mut self,
        env: &mut dyn Env,
        metadata: &Metadata,
        deposit: Option<&Deposit>,
        payload: &[u8],
    ) -> Result<(), CycleError> {
        match deposit {
            Some(Deposit::Erc20(deposit)) => {
                if deposit.value.is_zero() {
                    env.report(b"Deposit amount was 0, no action taken");
                    return Ok(());
                }

                env.erc20_withdraw(deposit.token, deposit.sender, deposit.value)?;
                info!(token = %deposit.token, depositor = %deposit.sender, amount = %deposit.value, "deposit refunded");
                env.notice(
                    format!(
                        "Processed ERC20 deposit: {} tokens from {}, voucher created",
                        deposit.value,
                        deposit.sender.to_hex()
                    )
                    .as_bytes(),
                );
                Ok(())
            }
            Some(other) => Err(CycleError::unknown_kind(other.kind())),
            None => {
                match std::str::from_utf8(payload) {
                    Ok(text) => {
                        env.notice(format!("Received input: {text}").as_bytes());
                    }
                    Err(_) => {
                        let sender = metadata.msg_sender.to_hex();
                        env.report(format!("Unknown input format from {sender}").as_bytes());
                    }
                }
                Ok(())
            }
        }
    }

    fn inspect(&mut self, env: &mut dyn EnvInspector, payload: &[u8]) -> Result<(), CycleError> {
        env.report(payload);
        Ok(())
    }
}

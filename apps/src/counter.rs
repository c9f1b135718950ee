//! # Counter
//!
//! Counts accepted advance inputs and announces the running total.

use rollbook_engine::{Application, CycleError, Deposit, Env, EnvInspector, Metadata};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Application state: the number of inputs seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterApp {
    count: u64,
}

impl CounterApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Application for CounterApp {
    fn advance(
        &mut self,
        env: &mut dyn Env,
        _metadata: &Metadata,
        _deposit: Option<&Deposit>,
        _payload: &[u8],
    ) -> Result<(), CycleError> {
        let next = self
            .count
            .checked_add(1)
            .ok_or_else(|| CycleError::Rejected("counter overflow".into()))?;
        env.notice(format!("Counter value: {next}").as_bytes());
        self.count = next;
        info!(count = next, "counter incremented");
        Ok(())
    }

    fn inspect(&mut self, env: &mut dyn EnvInspector, payload: &[u8]) -> Result<(), CycleError> {
        env.report(payload);
        Ok(())
    }
}

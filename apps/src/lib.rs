//! # Rollbook Sample Applications
//!
//! Applications that run on the rollbook engine. Each one implements
//! [`Application`] and nothing else: the engine handles decoding,
//! crediting deposits, commit and rollback.
//!
//! - **ERC20 Round-trip**: moves a deposit to the zero address and back,
//!   then withdraws it, narrating each step as a notice.
//! - **Echo**: refunds ERC20 deposits with a voucher and echoes text
//!   inputs as notices.
//! - **Counter**: counts accepted inputs.
//!
//! [`AppKind`] names them so the node can pick one at startup.

use std::fmt;
use std::str::FromStr;

use rollbook_engine::Application;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod counter;
pub mod echo;
pub mod erc20_roundtrip;

pub use counter::CounterApp;
pub use echo::EchoApp;
pub use erc20_roundtrip::Erc20RoundtripApp;

/// A boxed application the node can own without knowing its type.
pub type DynApplication = Box<dyn Application + Send>;

/// Returned when an application name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown application '{0}' (expected one of: erc20-roundtrip, echo, counter)")]
pub struct UnknownAppKind(pub String);

/// The applications this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    Erc20Roundtrip,
    Echo,
    Counter,
}

impl AppKind {
    /// Every variant, in display order.
    pub const ALL: [AppKind; 3] = [AppKind::Erc20Roundtrip, AppKind::Echo, AppKind::Counter];

    /// Command-line name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppKind::Erc20Roundtrip => "erc20-roundtrip",
            AppKind::Echo => "echo",
            AppKind::Counter => "counter",
        }
    }

    /// Instantiates the application with fresh state.
    pub fn build(&self) -> DynApplication {
        match self {
            AppKind::Erc20Roundtrip => Box::new(Erc20RoundtripApp::new()),
            AppKind::Echo => Box::new(EchoApp::new()),
            AppKind::Counter => Box::new(CounterApp::new()),
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = UnknownAppKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAppKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in AppKind::ALL {
            assert_eq!(kind.to_string().parse::<AppKind>().unwrap(), kind);
        }
        assert_eq!(" ECHO ".parse::<AppKind>().unwrap(), AppKind::Echo);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "wallet".parse::<AppKind>().unwrap_err();
        assert_eq!(err, UnknownAppKind("wallet".into()));
        assert!(err.to_string().contains("erc20-roundtrip"));
    }

    #[test]
    fn serde_uses_cli_names() {
        let json = serde_json::to_string(&AppKind::Erc20Roundtrip).unwrap();
        assert_eq!(json, "\"erc20-roundtrip\"");
    }
}

//! # CLI Interface
//!
//! Defines the command-line argument structure for `rollbook-node` using
//! `clap` derive. Supports three subcommands: `run`, `serve`, and
//! `version`.

use clap::{Args, Parser, Subcommand};

use rollbook_apps::AppKind;
use rollbook_engine::config::{
    DEFAULT_API_PORT, DEFAULT_ROLLUP_HTTP_SERVER_URL, ERC20_PORTAL_ADDRESS,
};
use rollbook_engine::{Address, EngineConfig};

/// Rollbook rollup application node.
///
/// Hosts a rollbook application either behind the rollup runtime's HTTP
/// API (`run`) or behind a local development API (`serve`).
#[derive(Parser, Debug)]
#[command(
    name = "rollbook-node",
    about = "Rollbook rollup application node",
    version,
    propagate_version = true
)]
pub struct RollbookNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the application from the rollup HTTP server.
    Run(RunArgs),
    /// Serve the application over a local development API.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by every subcommand that hosts an application.
#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Application to host: erc20-roundtrip, echo, or counter.
    #[arg(long, short = 'a', env = "ROLLBOOK_APP", default_value_t = AppKind::Erc20Roundtrip)]
    pub app: AppKind,

    /// Address of the ERC20 portal contract whose inputs are deposits.
    #[arg(long, env = "ROLLBOOK_ERC20_PORTAL", default_value_t = ERC20_PORTAL_ADDRESS)]
    pub erc20_portal: Address,

    /// Log output format: pretty or json.
    #[arg(long, env = "ROLLBOOK_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl AppArgs {
    /// Engine configuration derived from the flags.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_erc20_portal(self.erc20_portal)
    }
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub app: AppArgs,

    /// Base URL of the rollup HTTP server.
    #[arg(long, env = "ROLLUP_HTTP_SERVER_URL", default_value = DEFAULT_ROLLUP_HTTP_SERVER_URL)]
    pub rollup_url: String,

    /// Port for the Prometheus metrics endpoint. Disabled when omitted.
    #[arg(long, env = "ROLLBOOK_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Milliseconds to wait after the server reports no pending request.
    #[arg(long, default_value_t = 500)]
    pub idle_backoff_ms: u64,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub app: AppArgs,

    /// Port for the development API (metrics are served on it too).
    #[arg(long, short = 'p', env = "ROLLBOOK_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        RollbookNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = RollbookNodeCli::try_parse_from(["rollbook-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.app.app, AppKind::Erc20Roundtrip);
        assert_eq!(args.app.erc20_portal, ERC20_PORTAL_ADDRESS);
        assert_eq!(args.idle_backoff_ms, 500);
    }

    #[test]
    fn serve_accepts_app_and_portal() {
        let cli = RollbookNodeCli::try_parse_from([
            "rollbook-node",
            "serve",
            "--app",
            "echo",
            "--erc20-portal",
            "0x0000000000000000000000000000000000000001",
            "--port",
            "9000",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.app.app, AppKind::Echo);
        assert_eq!(args.port, 9000);
        assert_eq!(
            args.app.engine_config().erc20_portal,
            Address::new({
                let mut bytes = [0u8; 20];
                bytes[19] = 1;
                bytes
            })
        );
    }

    #[test]
    fn unknown_app_is_rejected() {
        let err = RollbookNodeCli::try_parse_from(["rollbook-node", "serve", "--app", "wallet"])
            .unwrap_err();
        assert!(err.to_string().contains("wallet"));
    }
}

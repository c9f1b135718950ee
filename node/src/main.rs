// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rollbook Node
//!
//! Entry point for the `rollbook-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and hosts one rollbook application.
//!
//! The binary supports three subcommands:
//!
//! - `run`    : drive the application from the rollup HTTP server
//! - `serve`  : host the application behind a local development API
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod rollup;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use rollbook_engine::Engine;

use cli::{Commands, RollbookNodeCli};
use logging::LogFormat;
use metrics::EngineMetrics;
use rollup::{RollupClient, RollupRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RollbookNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Serve(args) => serve_dev_api(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs the finish loop against the rollup HTTP server until a signal or
/// an HTTP failure.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_DIRECTIVES,
        LogFormat::from_str_lossy(&args.app.log_format),
    );

    tracing::info!(
        app = %args.app.app,
        rollup_url = %args.rollup_url,
        erc20_portal = %args.app.erc20_portal,
        "starting rollbook-node"
    );

    let metrics = Arc::new(EngineMetrics::new().context("failed to register metrics")?);
    let engine = Engine::new(args.app.app.build(), args.app.engine_config());
    let mut runner = RollupRunner::new(RollupClient::new(args.rollup_url.clone()), engine)
        .with_metrics(Arc::clone(&metrics))
        .with_idle_backoff(Duration::from_millis(args.idle_backoff_ms));

    // --- Optional metrics server ---
    let metrics_server = match args.metrics_port {
        Some(port) => {
            let router = axum::Router::new()
                .route("/metrics", axum::routing::get(metrics::metrics_handler))
                .with_state(Arc::clone(&metrics));
            let addr = format!("0.0.0.0:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
            tracing::info!("Metrics server listening on {}", addr);
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }))
        }
        None => None,
    };

    let result = tokio::select! {
        res = runner.run() => {
            res.with_context(|| format!("rollup loop against {} failed", args.rollup_url))
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    if let Some(handle) = metrics_server {
        handle.abort();
    }
    let engine = runner.engine();
    tracing::info!(
        accepted = engine.accepted_inputs(),
        rejected = engine.rejected_inputs(),
        ledger_digest = %engine.ledger().digest_hex(),
        "rollbook-node stopped"
    );
    result
}

/// Serves the development API until a signal.
async fn serve_dev_api(args: cli::ServeArgs) -> Result<()> {
    logging::init_logging(
        &format!("{},tower_http=debug", logging::DEFAULT_DIRECTIVES),
        LogFormat::from_str_lossy(&args.app.log_format),
    );

    let metrics = Arc::new(EngineMetrics::new().context("failed to register metrics")?);
    let state = api::AppState::new(args.app.app, args.app.engine_config(), metrics);
    let router = api::create_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    tracing::info!(app = %args.app.app, "Development API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("development API server failed")?;

    tracing::info!("rollbook-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("rollbook-node {}", env!("CARGO_PKG_VERSION"));
    println!("engine        {}", rollbook_engine::config::ENGINE_VERSION);
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed that branch never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! # Logging
//!
//! One `tracing` subscriber for the whole node. Events from the engine, the
//! applications and the HTTP layers share it, filtered by `RUST_LOG`.
//!
//! Everything goes to stderr. The rollup machine console reads stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "rollbook_node=info,rollbook_engine=info,rollbook_apps=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. For a terminal.
    Pretty,
    /// One JSON object per line, with the enclosing input span's fields.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; anything else falls
    /// back to [`LogFormat::Pretty`].
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Installs the global subscriber. Must run once, before the first event.
///
/// `directives` applies only when `RUST_LOG` is unset, for example
/// [`DEFAULT_DIRECTIVES`] or `rollbook_engine=debug,tower_http=debug`.
pub fn init_logging(directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
    }

    tracing::info!(?format, "logging initialized");
}

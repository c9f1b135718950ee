//! # Prometheus Metrics
//!
//! Operational metrics for the hosted application: cycle outcomes, outputs
//! emitted, and cycle latency. Scraped by Prometheus at `/metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use rollbook_engine::{CycleOutput, InspectOutput};

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared across request handlers and the runtime loop.
#[derive(Clone)]
pub struct EngineMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Advance inputs that committed.
    pub inputs_accepted_total: IntCounter,
    /// Advance inputs that rolled back.
    pub inputs_rejected_total: IntCounter,
    /// Inspect requests served.
    pub inspects_total: IntCounter,
    /// Notices emitted by committed cycles.
    pub notices_total: IntCounter,
    /// Vouchers emitted by committed cycles.
    pub vouchers_total: IntCounter,
    /// Reports emitted by cycles and inspects.
    pub reports_total: IntCounter,
    /// Time spent inside the engine per advance cycle, in seconds.
    pub cycle_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl EngineMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("rollbook".into()), None)?;

        let inputs_accepted_total = counter(
            &registry,
            "inputs_accepted_total",
            "Advance inputs whose cycle committed",
        )?;
        let inputs_rejected_total = counter(
            &registry,
            "inputs_rejected_total",
            "Advance inputs whose cycle rolled back",
        )?;
        let inspects_total = counter(&registry, "inspects_total", "Inspect requests served")?;
        let notices_total = counter(&registry, "notices_total", "Notices emitted")?;
        let vouchers_total = counter(&registry, "vouchers_total", "Vouchers emitted")?;
        let reports_total = counter(&registry, "reports_total", "Reports emitted")?;

        let cycle_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cycle_latency_seconds",
                "Time spent in the engine per advance cycle, in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(cycle_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            inputs_accepted_total,
            inputs_rejected_total,
            inspects_total,
            notices_total,
            vouchers_total,
            reports_total,
            cycle_latency_seconds,
        })
    }

    /// Records the outcome of one advance cycle.
    pub fn record_cycle(&self, output: &CycleOutput, elapsed: Duration) {
        if output.is_accepted() {
            self.inputs_accepted_total.inc();
        } else {
            self.inputs_rejected_total.inc();
        }
        self.notices_total.inc_by(output.notices().len() as u64);
        self.vouchers_total.inc_by(output.vouchers().len() as u64);
        self.reports_total.inc_by(output.reports.len() as u64);
        self.cycle_latency_seconds.observe(elapsed.as_secs_f64());
    }

    /// Records one inspect request.
    pub fn record_inspect(&self, output: &InspectOutput) {
        self.inspects_total.inc();
        self.reports_total.inc_by(output.reports.len() as u64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_engine::{CycleError, Report};

    #[test]
    fn rejected_cycle_counts_reports_only() {
        let metrics = EngineMetrics::new().unwrap();
        let output = CycleOutput {
            input_index: Some(0),
            outputs: Vec::new(),
            reports: vec![Report {
                payload: b"why".to_vec(),
            }],
            error: Some(CycleError::Rejected("no".into())),
        };
        metrics.record_cycle(&output, Duration::from_millis(2));

        assert_eq!(metrics.inputs_rejected_total.get(), 1);
        assert_eq!(metrics.inputs_accepted_total.get(), 0);
        assert_eq!(metrics.reports_total.get(), 1);
        assert_eq!(metrics.cycle_latency_seconds.get_sample_count(), 1);
    }

    #[test]
    fn encoded_output_uses_namespace() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.inspects_total.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("rollbook_inspects_total 1"));
    }
}

//! # Rollup HTTP Runtime
//!
//! Drives an [`Engine`] from the rollup runtime's HTTP API. The protocol is
//! a finish loop:
//!
//! 1. `POST /finish {"status": ...}` reports how the previous request went
//!    and asks for the next one. `202` means nothing is pending.
//! 2. A `200` carries `{"request_type", "data"}`. Advance requests run a
//!    cycle; inspect requests run a query. A body that is not a request is
//!    rejected like an unknown request type.
//! 3. Outputs go back through `/notice`, `/voucher` and `/report` before the
//!    next finish.
//!
//! Payloads on the wire are `0x`-prefixed hex strings.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use rollbook_engine::primitives::{encode_hex_payload, hex_bytes, u256_to_be_bytes};
use rollbook_engine::{
    Address, Application, CycleError, CycleOutput, Engine, InspectOutput, Notice, Output,
    RawInput, Report, Voucher,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures talking to the rollup HTTP server. Any of these ends the loop.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with unexpected status {status}")]
    UnexpectedStatus {
        endpoint: &'static str,
        status: StatusCode,
    },
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// Finish status reported for the previous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishStatus {
    Accept,
    Reject,
}

impl FinishStatus {
    fn from_accepted(accepted: bool) -> Self {
        if accepted {
            FinishStatus::Accept
        } else {
            FinishStatus::Reject
        }
    }
}

#[derive(Debug, Serialize)]
struct FinishBody {
    status: FinishStatus,
}

/// A pending request handed out by `/finish`.
#[derive(Debug, Clone, Deserialize)]
pub struct RollupRequest {
    pub request_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InspectData {
    #[serde(with = "hex_bytes")]
    payload: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct PayloadBody {
    payload: String,
}

impl PayloadBody {
    fn new(payload: &[u8]) -> Self {
        Self {
            payload: encode_hex_payload(payload),
        }
    }
}

#[derive(Debug, Serialize)]
struct VoucherBody {
    destination: Address,
    payload: String,
    /// 32-byte big-endian word.
    value: String,
}

impl From<&Voucher> for VoucherBody {
    fn from(voucher: &Voucher) -> Self {
        Self {
            destination: voucher.destination,
            payload: encode_hex_payload(&voucher.payload),
            value: encode_hex_payload(&u256_to_be_bytes(&voucher.value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin client for the rollup HTTP server.
#[derive(Debug, Clone)]
pub struct RollupClient {
    http: reqwest::Client,
    base_url: String,
}

impl RollupClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<reqwest::Response, RollupError> {
        self.http
            .post(format!("{}{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| RollupError::Http { endpoint, source })
    }

    /// Reports `status` and fetches the next request body, if any. The body
    /// is returned as JSON; [`RollupRequest`] decoding is left to the caller.
    pub async fn finish(
        &self,
        status: FinishStatus,
    ) -> Result<Option<serde_json::Value>, RollupError> {
        let endpoint = "/finish";
        let response = self.post(endpoint, &FinishBody { status }).await?;
        match response.status() {
            StatusCode::ACCEPTED => Ok(None),
            StatusCode::OK => response
                .json()
                .await
                .map(Some)
                .map_err(|source| RollupError::Http { endpoint, source }),
            status => Err(RollupError::UnexpectedStatus { endpoint, status }),
        }
    }

    pub async fn notice(&self, notice: &Notice) -> Result<(), RollupError> {
        self.send_output("/notice", &PayloadBody::new(&notice.payload))
            .await
    }

    pub async fn voucher(&self, voucher: &Voucher) -> Result<(), RollupError> {
        self.send_output("/voucher", &VoucherBody::from(voucher))
            .await
    }

    pub async fn report(&self, report: &Report) -> Result<(), RollupError> {
        self.send_output("/report", &PayloadBody::new(&report.payload))
            .await
    }

    async fn send_output<B: Serialize>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<(), RollupError> {
        let response = self.post(endpoint, body).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RollupError::UnexpectedStatus { endpoint, status });
        }
        debug!(endpoint, %status, "output sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Owns the engine and feeds it from the rollup server, one request at a
/// time.
pub struct RollupRunner<A> {
    client: RollupClient,
    engine: Engine<A>,
    metrics: Option<SharedMetrics>,
    next_status: FinishStatus,
    idle_backoff: Duration,
}

impl<A: Application> RollupRunner<A> {
    pub fn new(client: RollupClient, engine: Engine<A>) -> Self {
        Self {
            client,
            engine,
            metrics: None,
            next_status: FinishStatus::Accept,
            idle_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn engine(&self) -> &Engine<A> {
        &self.engine
    }

    /// Status the next `/finish` call will report.
    pub fn next_status(&self) -> FinishStatus {
        self.next_status
    }

    /// Loops until an HTTP failure. Cancel the future to stop.
    pub async fn run(&mut self) -> Result<(), RollupError> {
        info!(url = %self.client.base_url(), "entering finish loop");
        loop {
            if !self.step().await? {
                debug!("no pending request");
                tokio::time::sleep(self.idle_backoff).await;
            }
        }
    }

    /// One finish round trip. Returns `false` when nothing was pending.
    pub async fn step(&mut self) -> Result<bool, RollupError> {
        let Some(body) = self.client.finish(self.next_status).await? else {
            return Ok(false);
        };

        self.next_status = match serde_json::from_value::<RollupRequest>(body) {
            Ok(request) => match request.request_type.as_str() {
                "advance_state" => self.handle_advance(request.data).await?,
                "inspect_state" => self.handle_inspect(request.data).await?,
                other => {
                    warn!(request_type = other, "unknown request type");
                    self.reject_request(format!("request type '{other}'")).await?
                }
            },
            Err(err) => {
                warn!(error = %err, "undecodable finish response");
                self.reject_request(format!("undecodable request: {err}"))
                    .await?
            }
        };
        Ok(true)
    }

    async fn handle_advance(&mut self, data: serde_json::Value) -> Result<FinishStatus, RollupError> {
        let raw = match serde_json::from_value::<RawInput>(data) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "undecodable advance request");
                return self
                    .reject_request(format!("undecodable advance request: {err}"))
                    .await;
            }
        };

        let started = Instant::now();
        let output = self.engine.advance(raw);
        self.record_cycle(&output, started);
        self.publish_cycle(&output).await?;
        Ok(FinishStatus::from_accepted(output.is_accepted()))
    }

    async fn handle_inspect(&mut self, data: serde_json::Value) -> Result<FinishStatus, RollupError> {
        // Inspects never reach the engine's cycle path, even when malformed.
        let output = match serde_json::from_value::<InspectData>(data) {
            Ok(data) => self.engine.inspect(&data.payload),
            Err(err) => {
                warn!(error = %err, "undecodable inspect request");
                let err = CycleError::unknown_kind(format!("undecodable inspect request: {err}"));
                InspectOutput {
                    reports: vec![Report {
                        payload: err.to_string().into_bytes(),
                    }],
                    error: Some(err),
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_inspect(&output);
        }
        for report in &output.reports {
            self.client.report(report).await?;
        }
        Ok(FinishStatus::from_accepted(output.is_accepted()))
    }

    /// Rolls back a request the engine cannot run and publishes its report.
    async fn reject_request(&mut self, kind: String) -> Result<FinishStatus, RollupError> {
        let started = Instant::now();
        let output = self.engine.reject_unknown(kind);
        self.record_cycle(&output, started);
        self.publish_cycle(&output).await?;
        Ok(FinishStatus::Reject)
    }

    fn record_cycle(&self, output: &CycleOutput, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(output, started.elapsed());
        }
    }

    /// Sends outputs in emission order, then reports.
    async fn publish_cycle(&self, output: &CycleOutput) -> Result<(), RollupError> {
        for item in &output.outputs {
            match item {
                Output::Notice(notice) => self.client.notice(notice).await?,
                Output::Voucher(voucher) => self.client.voucher(voucher).await?,
            }
        }
        for report in &output.reports {
            self.client.report(report).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use rollbook_apps::{CounterApp, Erc20RoundtripApp};
    use rollbook_engine::config::ERC20_PORTAL_ADDRESS;
    use rollbook_engine::{CycleState, EngineConfig, Erc20Deposit, U256};

    use crate::metrics::EngineMetrics;

    /// In-process stand-in for the rollup HTTP server.
    #[derive(Default)]
    struct MockServer {
        pending: VecDeque<Value>,
        finishes: Vec<String>,
        notices: Vec<Value>,
        vouchers: Vec<Value>,
        reports: Vec<Value>,
    }

    type Shared = Arc<Mutex<MockServer>>;

    async fn finish(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
        let mut server = state.lock();
        server
            .finishes
            .push(body["status"].as_str().unwrap_or_default().to_string());
        match server.pending.pop_front() {
            Some(request) => (AxumStatus::OK, Json(request)).into_response(),
            None => AxumStatus::ACCEPTED.into_response(),
        }
    }

    async fn notice(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
        state.lock().notices.push(body);
        AxumStatus::CREATED
    }

    async fn voucher(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
        state.lock().vouchers.push(body);
        AxumStatus::CREATED
    }

    async fn report(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
        state.lock().reports.push(body);
        AxumStatus::ACCEPTED
    }

    async fn spawn_mock(pending: Vec<Value>) -> (String, Shared) {
        let state: Shared = Arc::new(Mutex::new(MockServer {
            pending: pending.into(),
            ..Default::default()
        }));
        let router = Router::new()
            .route("/finish", post(finish))
            .route("/notice", post(notice))
            .route("/voucher", post(voucher))
            .route("/report", post(report))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn advance_request(sender: Address, payload: &[u8]) -> Value {
        json!({
            "request_type": "advance_state",
            "data": {
                "metadata": {
                    "chain_id": 31337,
                    "app_contract": "0x0000000000000000000000000000000000000000",
                    "msg_sender": sender,
                    "input_index": 0,
                    "block_number": 10,
                    "block_timestamp": 1_700_000_000u64
                },
                "payload": encode_hex_payload(payload)
            }
        })
    }

    fn hex_text(value: &Value) -> String {
        let payload = value["payload"].as_str().unwrap();
        let bytes = rollbook_engine::primitives::decode_hex_payload(payload).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn deposit_publishes_notices_then_voucher() {
        let user: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
        let token: Address = "0xa0Ee7A142d267C1f36714E4a8F75612F20a79720".parse().unwrap();
        let deposit = Erc20Deposit {
            token,
            sender: user,
            value: U256::from(10_000u64),
            exec_layer_data: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let (url, state) =
            spawn_mock(vec![advance_request(ERC20_PORTAL_ADDRESS, &deposit.encode())]).await;

        let engine = Engine::new(Erc20RoundtripApp::new(), EngineConfig::default());
        let mut runner = RollupRunner::new(RollupClient::new(url), engine);
        assert!(runner.step().await.unwrap());
        assert!(!runner.step().await.unwrap());

        let server = state.lock();
        assert_eq!(server.finishes, vec!["accept", "accept"]);
        assert_eq!(server.notices.len(), 4);
        assert!(hex_text(&server.notices[3]).ends_with(": 0 after withdraw"));
        assert_eq!(server.vouchers.len(), 1);
        assert_eq!(
            server.vouchers[0]["destination"],
            "0xa0Ee7A142d267C1f36714E4a8F75612F20a79720"
        );
        assert_eq!(
            server.vouchers[0]["value"],
            "0x0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert!(server.vouchers[0]["payload"]
            .as_str()
            .unwrap()
            .starts_with("0xa9059cbb000000000000000000000000"));
    }

    #[tokio::test]
    async fn rejected_cycle_reports_and_finishes_with_reject() {
        let user: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
        let (url, state) = spawn_mock(vec![advance_request(user, b"hello")]).await;

        let engine = Engine::new(Erc20RoundtripApp::new(), EngineConfig::default());
        let mut runner = RollupRunner::new(RollupClient::new(url), engine);
        runner.step().await.unwrap();
        assert_eq!(runner.next_status(), FinishStatus::Reject);
        runner.step().await.unwrap();

        let server = state.lock();
        assert_eq!(server.finishes, vec!["accept", "reject"]);
        assert!(server.notices.is_empty());
        assert_eq!(hex_text(&server.reports[0]), "unknown input kind: generic");
    }

    #[tokio::test]
    async fn inspect_and_unknown_request_types() {
        let (url, state) = spawn_mock(vec![
            json!({ "request_type": "inspect_state", "data": { "payload": "0x6869" } }),
            json!({ "request_type": "teleport", "data": {} }),
        ])
        .await;

        let engine = Engine::new(CounterApp::new(), EngineConfig::default());
        let mut runner = RollupRunner::new(RollupClient::new(url), engine);
        runner.step().await.unwrap();
        runner.step().await.unwrap();
        runner.step().await.unwrap();

        let server = state.lock();
        assert_eq!(server.finishes, vec!["accept", "accept", "reject"]);
        assert_eq!(hex_text(&server.reports[0]), "hi");
        assert_eq!(
            hex_text(&server.reports[1]),
            "unknown input kind: request type 'teleport'"
        );
        assert_eq!(runner.engine().rejected_inputs(), 1);
    }

    #[tokio::test]
    async fn malformed_inspect_is_report_only() {
        let (url, state) = spawn_mock(vec![
            json!({ "request_type": "inspect_state", "data": { "payload": "not hex" } }),
        ])
        .await;

        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let engine = Engine::new(CounterApp::new(), EngineConfig::default());
        let mut runner =
            RollupRunner::new(RollupClient::new(url), engine).with_metrics(Arc::clone(&metrics));
        runner.step().await.unwrap();
        assert_eq!(runner.next_status(), FinishStatus::Reject);

        let server = state.lock();
        assert!(hex_text(&server.reports[0]).starts_with("unknown input kind: undecodable inspect"));
        assert_eq!(runner.engine().rejected_inputs(), 0);
        assert_eq!(runner.engine().last_state(), CycleState::Idle);
        assert_eq!(metrics.inspects_total.get(), 1);
        assert_eq!(metrics.inputs_rejected_total.get(), 0);
    }

    #[tokio::test]
    async fn unknown_request_types_are_counted() {
        let (url, _state) = spawn_mock(vec![json!({ "request_type": "teleport", "data": {} })]).await;

        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let engine = Engine::new(CounterApp::new(), EngineConfig::default());
        let mut runner =
            RollupRunner::new(RollupClient::new(url), engine).with_metrics(Arc::clone(&metrics));
        runner.step().await.unwrap();

        assert_eq!(metrics.inputs_rejected_total.get(), 1);
        assert_eq!(metrics.reports_total.get(), 1);
    }

    #[tokio::test]
    async fn request_without_type_is_rejected_not_fatal() {
        let (url, state) = spawn_mock(vec![
            json!({ "data": { "payload": "0x" } }),
            json!({ "request_type": "inspect_state", "data": { "payload": "0x6f6b" } }),
        ])
        .await;

        let engine = Engine::new(CounterApp::new(), EngineConfig::default());
        let mut runner = RollupRunner::new(RollupClient::new(url), engine);
        assert!(runner.step().await.unwrap());
        assert_eq!(runner.next_status(), FinishStatus::Reject);
        assert!(runner.step().await.unwrap());

        let server = state.lock();
        assert_eq!(server.finishes, vec!["accept", "reject"]);
        assert!(hex_text(&server.reports[0]).starts_with("unknown input kind: undecodable request"));
        assert_eq!(hex_text(&server.reports[1]), "ok");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let client = RollupClient::new("http://127.0.0.1:1");
        let err = client.finish(FinishStatus::Accept).await.unwrap_err();
        assert!(matches!(err, RollupError::Http { endpoint: "/finish", .. }));
    }
}

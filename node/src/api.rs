//! # Development API
//!
//! Builds the axum router that hosts an application without a rollup
//! runtime. Inputs are submitted over HTTP, the harness fills in metadata,
//! and every committed output is kept in memory for inspection.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                         |
//! |--------|-------------------------------|-------------------------------------|
//! | GET    | `/health`                     | Liveness probe                      |
//! | GET    | `/status`                     | App, counters, ledger digest        |
//! | POST   | `/advance`                    | Generic input `{msg_sender, payload}` |
//! | POST   | `/deposit/erc20`              | Portal deposit `{token, sender, amount, payload}` |
//! | POST   | `/inspect`                    | Raw body as inspect payload         |
//! | GET    | `/inspect/:payload`           | Path segment as inspect payload     |
//! | GET    | `/notices`                    | Committed notices                   |
//! | GET    | `/vouchers`                   | Committed vouchers                  |
//! | GET    | `/reports`                    | Reports from every cycle            |
//! | GET    | `/balances/:token/:account`   | Committed ERC20 balance             |
//! | GET    | `/metrics`                    | Prometheus metrics                  |
//!
//! Payload strings starting with `0x` are decoded as hex; anything else is
//! taken as UTF-8 text.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{FromRef, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rollbook_apps::{AppKind, DynApplication};
use rollbook_engine::primitives::{decode_hex_payload, encode_hex_payload, u256_dec};
use rollbook_engine::{
    Address, CycleOutput, CycleState, EngineConfig, ErrorKind, InspectOutput, Output, Tester, U256,
};

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The hosted application plus everything it has emitted so far.
pub struct DevChain {
    tester: Tester<DynApplication>,
    notices: Vec<NoticeEntry>,
    vouchers: Vec<VoucherEntry>,
    reports: Vec<ReportEntry>,
}

impl DevChain {
    pub fn new(app: DynApplication, config: EngineConfig) -> Self {
        Self {
            tester: Tester::with_config(app, config),
            notices: Vec::new(),
            vouchers: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Appends a cycle's outputs to the history and returns its summary.
    fn record(&mut self, output: &CycleOutput) -> CycleResponse {
        let response = CycleResponse::from(output);
        self.notices.extend(response.notices.iter().cloned());
        self.vouchers.extend(response.vouchers.iter().cloned());
        self.reports.extend(response.reports.iter().cloned());
        response
    }
}

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Which application is hosted.
    pub app: AppKind,
    /// The node's reported version string.
    pub version: String,
    /// Engine and output history. Locked only for synchronous engine calls.
    pub chain: Arc<Mutex<DevChain>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(app: AppKind, config: EngineConfig, metrics: SharedMetrics) -> Self {
        Self {
            app,
            version: format!(
                "{} (engine {})",
                env!("CARGO_PKG_VERSION"),
                rollbook_engine::config::ENGINE_VERSION
            ),
            chain: Arc::new(Mutex::new(DevChain::new(app.build(), config))),
            metrics,
        }
    }
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/advance", post(advance_handler))
        .route("/deposit/erc20", post(deposit_handler))
        .route("/inspect", post(inspect_body_handler))
        .route(
            "/inspect/:payload",
            get(inspect_path_handler).post(inspect_app_handler),
        )
        .route("/notices", get(notices_handler))
        .route("/vouchers", get(vouchers_handler))
        .route("/reports", get(reports_handler))
        .route("/balances/:token/:account", get(balance_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /advance`.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub msg_sender: Address,
    #[serde(default)]
    pub payload: String,
}

/// Body of `POST /deposit/erc20`.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub token: Address,
    pub sender: Address,
    /// Decimal or `0x` hex.
    #[serde(with = "u256_dec")]
    pub amount: U256,
    /// Execution-layer data appended after the deposit header.
    #[serde(default)]
    pub payload: String,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// A committed notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeEntry {
    pub input_index: u64,
    /// Position in the input's output sequence.
    pub index: usize,
    pub payload: String,
    /// The payload as text, when it is valid UTF-8.
    pub text: Option<String>,
}

/// The ERC20 call a voucher encodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferView {
    pub recipient: Address,
    pub amount: String,
}

/// A committed voucher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub input_index: u64,
    /// Position in the input's output sequence.
    pub index: usize,
    pub destination: Address,
    pub payload: String,
    pub value: String,
    /// Present when the payload is an ERC20 `transfer` call.
    pub erc20_transfer: Option<TransferView>,
}

/// A report from an advance cycle, committed or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Absent for inputs rejected before they had an index.
    pub input_index: Option<u64>,
    /// Position among the cycle's reports.
    pub index: usize,
    pub payload: String,
    pub text: Option<String>,
}

/// Why a cycle or query was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Response payload for `POST /advance` and `POST /deposit/erc20`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleResponse {
    pub input_index: Option<u64>,
    pub status: String,
    pub error: Option<ErrorBody>,
    pub notices: Vec<NoticeEntry>,
    pub vouchers: Vec<VoucherEntry>,
    pub reports: Vec<ReportEntry>,
}

impl From<&CycleOutput> for CycleResponse {
    fn from(output: &CycleOutput) -> Self {
        let mut notices = Vec::new();
        let mut vouchers = Vec::new();
        if let Some(input_index) = output.input_index {
            for (index, item) in output.outputs.iter().enumerate() {
                match item {
                    Output::Notice(notice) => notices.push(NoticeEntry {
                        input_index,
                        index,
                        payload: encode_hex_payload(&notice.payload),
                        text: as_text(&notice.payload),
                    }),
                    Output::Voucher(voucher) => vouchers.push(VoucherEntry {
                        input_index,
                        index,
                        destination: voucher.destination,
                        payload: encode_hex_payload(&voucher.payload),
                        value: voucher.value.to_string(),
                        erc20_transfer: voucher.as_erc20_transfer().map(|(recipient, amount)| {
                            TransferView {
                                recipient,
                                amount: amount.to_string(),
                            }
                        }),
                    }),
                }
            }
        }

        let reports = output
            .reports
            .iter()
            .enumerate()
            .map(|(index, report)| ReportEntry {
                input_index: output.input_index,
                index,
                payload: encode_hex_payload(&report.payload),
                text: as_text(&report.payload),
            })
            .collect();

        Self {
            input_index: output.input_index,
            status: output.status().to_string(),
            error: output.error.as_ref().map(|err| ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
            notices,
            vouchers,
            reports,
        }
    }
}

/// One inspect report.
#[derive(Debug, Serialize, Deserialize)]
pub struct PayloadView {
    pub payload: String,
    pub text: Option<String>,
}

/// Response payload for the inspect endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectResponse {
    pub status: String,
    pub error: Option<ErrorBody>,
    pub reports: Vec<PayloadView>,
}

impl From<&InspectOutput> for InspectResponse {
    fn from(output: &InspectOutput) -> Self {
        Self {
            status: output.status().to_string(),
            error: output.error.as_ref().map(|err| ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
            reports: output
                .reports
                .iter()
                .map(|report| PayloadView {
                    payload: encode_hex_payload(&report.payload),
                    text: as_text(&report.payload),
                })
                .collect(),
        }
    }
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub app: AppKind,
    pub accepted_inputs: u64,
    pub rejected_inputs: u64,
    pub next_input_index: u64,
    pub last_state: CycleState,
    /// BLAKE3 digest of the committed ledger.
    pub ledger_digest: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /balances/:token/:account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub token: Address,
    pub account: Address,
    pub balance: String,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn as_text(payload: &[u8]) -> Option<String> {
    String::from_utf8(payload.to_vec()).ok()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

/// `0x`-prefixed strings are hex, anything else is UTF-8 text.
fn decode_payload(payload: &str) -> Result<Vec<u8>, Response> {
    if payload.starts_with("0x") || payload.starts_with("0X") {
        decode_hex_payload(payload).map_err(|e| bad_request(format!("invalid hex payload: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the server is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: engine counters and the ledger digest.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let chain = state.chain.lock();
    let engine = chain.tester.engine();
    Json(StatusResponse {
        version: state.version.clone(),
        app: state.app,
        accepted_inputs: engine.accepted_inputs(),
        rejected_inputs: engine.rejected_inputs(),
        next_input_index: chain.tester.next_input_index(),
        last_state: engine.last_state(),
        ledger_digest: engine.ledger().digest_hex(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /advance`: submits a generic input.
async fn advance_handler(
    State(state): State<AppState>,
    Json(req): Json<AdvanceRequest>,
) -> Response {
    let payload = match decode_payload(&req.payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let started = Instant::now();
    let mut chain = state.chain.lock();
    let output = chain.tester.advance(req.msg_sender, &payload);
    state.metrics.record_cycle(&output, started.elapsed());
    let response = chain.record(&output);
    drop(chain);

    tracing::info!(
        input_index = ?response.input_index,
        status = %response.status,
        sender = %req.msg_sender,
        "advance submitted"
    );
    Json(response).into_response()
}

/// `POST /deposit/erc20`: submits a deposit through the ERC20 portal.
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Response {
    let payload = match decode_payload(&req.payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let started = Instant::now();
    let mut chain = state.chain.lock();
    let output = chain
        .tester
        .deposit_erc20(req.token, req.sender, req.amount, &payload);
    state.metrics.record_cycle(&output, started.elapsed());
    let response = chain.record(&output);
    drop(chain);

    tracing::info!(
        input_index = ?response.input_index,
        status = %response.status,
        token = %req.token,
        sender = %req.sender,
        amount = %req.amount,
        "deposit submitted"
    );
    Json(response).into_response()
}

fn run_inspect(state: &AppState, payload: &[u8]) -> Json<InspectResponse> {
    let output = state.chain.lock().tester.inspect(payload);
    state.metrics.record_inspect(&output);
    Json(InspectResponse::from(&output))
}

/// `POST /inspect`: the raw request body is the query.
async fn inspect_body_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    run_inspect(&state, &body)
}

/// `GET /inspect/:payload`: the path segment is the query.
async fn inspect_path_handler(
    Path(payload): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    run_inspect(&state, payload.as_bytes())
}

/// `POST /inspect/:app`: the frontend's form. The path names the
/// application address and is ignored; the body is the query.
async fn inspect_app_handler(
    Path(_app): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    run_inspect(&state, &body)
}

/// `GET /notices`
async fn notices_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.chain.lock().notices.clone())
}

/// `GET /vouchers`
async fn vouchers_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.chain.lock().vouchers.clone())
}

/// `GET /reports`
async fn reports_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.chain.lock().reports.clone())
}

/// `GET /balances/:token/:account`: committed balance, decimal.
async fn balance_handler(
    Path((token, account)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let token: Address = match token.parse() {
        Ok(address) => address,
        Err(e) => return bad_request(format!("invalid token address: {e}")),
    };
    let account: Address = match account.parse() {
        Ok(address) => address,
        Err(e) => return bad_request(format!("invalid account address: {e}")),
    };

    let balance = state.chain.lock().tester.erc20_balance_of(token, account);
    Json(BalanceResponse {
        token,
        account,
        balance: balance.to_string(),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # REST API
//!
//! Builds the axum router for the node's HTTP interface. All handlers share
//! [`AppState`] through axum's `State` extractor. Identities, account
//! addresses, mints and vaults travel as 64-character hex strings.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                      |
//! |--------|-------------------------------|----------------------------------|
//! | GET    | `/health`                     | Liveness probe                   |
//! | GET    | `/token`                      | Token info                       |
//! | POST   | `/token/initialize`           | Create the token info record     |
//! | POST   | `/accounts`                   | Create a balance account         |
//! | GET    | `/accounts/:owner`            | Balance account by owner         |
//! | POST   | `/mint`                       | Mint into an account             |
//! | POST   | `/transfer`                   | Owner transfer                   |
//! | POST   | `/approve`                    | Set an allowance                 |
//! | POST   | `/transfer-from`              | Spend an allowance               |
//! | POST   | `/deposit`                    | Wrap external tokens             |
//! | POST   | `/withdraw`                   | Unwrap to external tokens        |
//! | GET    | `/allowances/:owner/:spender` | Remaining allowance              |
//! | POST   | `/custody/fund`               | Faucet (only if enabled)         |
//! | GET    | `/custody/:mint/:holder`      | External holding                 |
//!
//! Mutating requests carry a `caller` field: the identity already verified
//! by whatever authentication layer sits in front of the node.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use wrapt_ledger::config::DEFAULT_DECIMALS;
use wrapt_ledger::{
    Address, CustodyError, ErrorKind, Ledger, LedgerError, LedgerResult, LocalCustody, SledStore,
    TokenInfo, TokenMetadata,
};

use crate::metrics::SharedMetrics;

/// Store shared by the ledger and local custody.
pub type NodeStore = Arc<SledStore>;

/// The ledger as the node runs it.
pub type NodeLedger = Ledger<NodeStore, LocalCustody<NodeStore>>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub ledger: Arc<NodeLedger>,
    pub metrics: SharedMetrics,
    /// Whether `POST /custody/fund` is routed.
    pub faucet_enabled: bool,
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

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/token", get(token_handler))
        .route("/token/initialize", post(initialize_handler))
        .route("/accounts", post(create_account_handler))
        .route("/accounts/:owner", get(account_handler))
        .route("/mint", post(mint_handler))
        .route("/transfer", post(transfer_handler))
        .route("/approve", post(approve_handler))
        .route("/transfer-from", post(transfer_from_handler))
        .route("/deposit", post(deposit_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/allowances/:owner/:spender", get(allowance_handler))
        .route("/custody/:mint/:holder", get(holding_handler));

    if state.faucet_enabled {
        router = router.route("/custody/fund", post(fund_handler));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /token/initialize`. The caller becomes the token admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub caller: Address,
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// External token being wrapped.
    pub mint: Address,
    /// Custody vault holding the wrapped external tokens.
    pub vault: Address,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

/// Body of `POST /accounts`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: Address,
}

/// Body of `POST /mint`, `/deposit` and `/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    pub caller: Address,
    /// Account address (not owner identity).
    pub account: Address,
    pub amount: u64,
}

/// Body of `POST /transfer` and `/transfer-from`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub caller: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

/// Body of `POST /approve`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub caller: Address,
    /// The caller's own account.
    pub account: Address,
    pub spender: Address,
    pub amount: u64,
}

/// Body of `POST /custody/fund`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FundRequest {
    pub mint: Address,
    pub holder: Address,
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub owner: Address,
    pub balance: u64,
    /// Part of `balance` redeemable through `/withdraw`.
    pub wrapped: u64,
}

/// Response to mint, deposit and withdraw.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: Address,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    /// Allowance left after a `transfer-from`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remaining_allowance: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub owner: Address,
    pub spender: Address,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HoldingResponse {
    pub mint: Address,
    pub holder: Address,
    pub amount: u64,
}

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<ErrorKind>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler failure, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    /// The blocking ledger task died.
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<CustodyError> for ApiError {
    fn from(err: CustodyError) -> Self {
        ApiError::Ledger(err.into())
    }
}

/// HTTP status for a ledger error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::AccountNotFound | ErrorKind::NotInitialized => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::AlreadyInitialized => StatusCode::CONFLICT,
        ErrorKind::InsufficientBalance
        | ErrorKind::AllowanceExceeded
        | ErrorKind::Overflow
        | ErrorKind::InvalidMetadata => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::CustodyFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Ledger(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Storage {
                    tracing::error!(error = %err, "storage failure");
                }
                (
                    status_for(kind),
                    ErrorResponse {
                        error: err.to_string(),
                        kind: Some(kind),
                    },
                )
            }
            ApiError::Internal(message) => {
                tracing::error!(%message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: message,
                        kind: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Runs a mutating ledger operation off the async workers, timing it and
/// counting its outcome.
async fn run_operation<T, F>(state: &AppState, operation: &'static str, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&NodeLedger) -> LedgerResult<T> + Send + 'static,
{
    let timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&[operation])
        .start_timer();
    let ledger = Arc::clone(&state.ledger);
    let result = tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ApiError::Internal(format!("{operation} task failed: {e}")))?;
    timer.observe_duration();

    state.metrics.record(operation, &result);
    Ok(result?)
}

/// Pushes the current supply counters into the gauges.
fn refresh_supply(state: &AppState) {
    match state.ledger.token_info() {
        Ok(Some(info)) => state.metrics.observe_supply(&info),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to read token info for metrics"),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `GET /token`: token info, 404 before initialization.
async fn token_handler(State(state): State<AppState>) -> ApiResult<Json<TokenInfo>> {
    let info = state.ledger.token_info()?.ok_or(LedgerError::NotInitialized)?;
    Ok(Json(info))
}

/// `POST /token/initialize`
async fn initialize_handler(
    State(state): State<AppState>,
    Json(req): Json<InitializeRequest>,
) -> ApiResult<(StatusCode, Json<TokenInfo>)> {
    let metadata = TokenMetadata::new(req.name, req.symbol, req.decimals);
    let info = run_operation(&state, "initialize", move |ledger| {
        ledger.initialize(&req.caller, metadata, &req.mint, &req.vault)
    })
    .await?;
    state.metrics.observe_supply(&info);
    Ok((StatusCode::CREATED, Json(info)))
}

/// `POST /accounts`
async fn create_account_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let owner = req.owner;
    let address = run_operation(&state, "create_account", move |ledger| {
        ledger.create_account(&owner)
    })
    .await?;
    state.metrics.accounts_created_total.inc();

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            address,
            owner,
            balance: 0,
            wrapped: 0,
        }),
    ))
}

/// `GET /accounts/:owner`
async fn account_handler(
    Path(owner): Path<Address>,
    State(state): State<AppState>,
) -> ApiResult<Json<AccountResponse>> {
    let address = NodeLedger::account_address(&owner);
    let account = state
        .ledger
        .account(&address)?
        .ok_or(LedgerError::AccountNotFound(address))?;

    Ok(Json(AccountResponse {
        address,
        owner: account.owner,
        balance: account.balance,
        wrapped: account.wrapped,
    }))
}

/// `POST /mint`
async fn mint_handler(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let account = req.account;
    let balance = run_operation(&state, "mint", move |ledger| {
        ledger.mint(&req.caller, &req.account, req.amount)
    })
    .await?;
    refresh_supply(&state);
    Ok(Json(BalanceResponse { account, balance }))
}

/// `POST /transfer`
async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let TransferRequest {
        caller,
        from,
        to,
        amount,
    } = req;
    run_operation(&state, "transfer", move |ledger| {
        ledger.transfer(&caller, &from, &to, amount)
    })
    .await?;

    Ok(Json(TransferResponse {
        from,
        to,
        amount,
        remaining_allowance: None,
    }))
}

/// `POST /approve`
async fn approve_handler(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<Json<AllowanceResponse>> {
    let ApproveRequest {
        caller,
        account,
        spender,
        amount,
    } = req;
    run_operation(&state, "approve", move |ledger| {
        ledger.approve(&caller, &account, &spender, amount)
    })
    .await?;

    Ok(Json(AllowanceResponse {
        owner: caller,
        spender,
        amount,
    }))
}

/// `POST /transfer-from`: the caller is the spender.
async fn transfer_from_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let TransferRequest {
        caller,
        from,
        to,
        amount,
    } = req;
    let remaining = run_operation(&state, "transfer_from", move |ledger| {
        ledger.transfer_from(&caller, &from, &to, amount)
    })
    .await?;

    Ok(Json(TransferResponse {
        from,
        to,
        amount,
        remaining_allowance: Some(remaining),
    }))
}

/// `POST /deposit`
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let account = req.account;
    let balance = run_operation(&state, "deposit", move |ledger| {
        ledger.deposit(&req.caller, &req.account, req.amount)
    })
    .await?;
    refresh_supply(&state);
    Ok(Json(BalanceResponse { account, balance }))
}

/// `POST /withdraw`
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let account = req.account;
    let balance = run_operation(&state, "withdraw", move |ledger| {
        ledger.withdraw(&req.caller, &req.account, req.amount)
    })
    .await?;
    refresh_supply(&state);
    Ok(Json(BalanceResponse { account, balance }))
}

/// `GET /allowances/:owner/:spender`: zero when nothing was approved.
async fn allowance_handler(
    Path((owner, spender)): Path<(Address, Address)>,
    State(state): State<AppState>,
) -> ApiResult<Json<AllowanceResponse>> {
    let amount = state.ledger.allowance(&owner, &spender)?;
    Ok(Json(AllowanceResponse {
        owner,
        spender,
        amount,
    }))
}

/// `POST /custody/fund`: credits an external holding out of thin air.
async fn fund_handler(
    State(state): State<AppState>,
    Json(req): Json<FundRequest>,
) -> ApiResult<Json<HoldingResponse>> {
    let amount = state
        .ledger
        .custody()
        .fund(&req.mint, &req.holder, req.amount)?;
    tracing::info!(mint = %req.mint, holder = %req.holder, funded = req.amount, "faucet used");

    Ok(Json(HoldingResponse {
        mint: req.mint,
        holder: req.holder,
        amount,
    }))
}

/// `GET /custody/:mint/:holder`
async fn holding_handler(
    Path((mint, holder)): Path<(Address, Address)>,
    State(state): State<AppState>,
) -> ApiResult<Json<HoldingResponse>> {
    let amount = state.ledger.custody().holding(&mint, &holder)?;
    Ok(Json(HoldingResponse {
        mint,
        holder,
        amount,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

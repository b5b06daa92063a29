//! Local development node for message boards.
//!
//! Hosts any number of boards in one [`Ledger`], accepts signed transactions
//! over HTTP, mines each one into its own block and serves receipts, board
//! reads and emitted events.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use board_common::address::{Address, TxHash};
use board_common::api::{
    ChainInfo, CountResponse, ErrorResponse, EventsQuery, HealthResponse, MessagesQuery,
    ProtocolIdResponse, SubmitResponse, UserMessagesResponse, MAX_PAGE,
};
use board_common::board::MessageBoardState;
use board_common::ledger::{Ledger, SubmitError};
use board_common::message::{Message, MessageColumns, MessageId};
use board_common::transaction::{LoggedEvent, SignedTx, TxReceipt};

pub struct NodeState {
    chain_name: String,
    ledger: RwLock<Ledger>,
}

impl NodeState {
    pub fn new(chain_id: u64, chain_name: impl Into<String>) -> Self {
        Self {
            chain_name: chain_name.into(),
            ledger: RwLock::new(Ledger::new(chain_id)),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn no_board(board: &Address) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("no board deployed at {board}"))
}

fn with_board<T>(
    ledger: &Ledger,
    board: &Address,
    read: impl FnOnce(&MessageBoardState) -> T,
) -> Result<T, ApiError> {
    ledger.board(board).map(read).ok_or_else(|| no_board(board))
}

// ─── Chain handlers ─────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<NodeState>>) -> Json<HealthResponse> {
    let ledger = state.ledger.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        chain_id: ledger.chain_id(),
        block_number: ledger.block_number(),
    })
}

async fn chain_handler(State(state): State<Arc<NodeState>>) -> Json<ChainInfo> {
    let ledger = state.ledger.read().await;
    Json(ChainInfo {
        chain_id: ledger.chain_id(),
        chain_name: state.chain_name.clone(),
        block_number: ledger.block_number(),
    })
}

async fn submit_handler(
    State(state): State<Arc<NodeState>>,
    Json(tx): Json<SignedTx>,
) -> ApiResult<SubmitResponse> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let receipt = state
        .ledger
        .write()
        .await
        .submit(&tx, now)
        .map_err(|e| {
            tracing::warn!(error = %e, method = tx.call.method(), "Refused transaction");
            let status = match e {
                SubmitError::BadSignature => StatusCode::UNAUTHORIZED,
                SubmitError::Duplicate(_) => StatusCode::CONFLICT,
            };
            api_error(status, e.to_string())
        })?;

    match &receipt.revert_reason {
        None => tracing::info!(
            tx = %receipt.tx_hash,
            from = %receipt.from,
            block = receipt.block_number,
            method = tx.call.method(),
            "Mined transaction"
        ),
        Some(reason) => tracing::info!(
            tx = %receipt.tx_hash,
            from = %receipt.from,
            block = receipt.block_number,
            method = tx.call.method(),
            %reason,
            "Mined reverted transaction"
        ),
    }
    if let Some(address) = receipt.contract_address {
        tracing::info!(%address, "MessageBoard deployed");
    }

    Ok(Json(SubmitResponse {
        tx_hash: receipt.tx_hash,
    }))
}

async fn receipt_handler(
    State(state): State<Arc<NodeState>>,
    Path(tx_hash): Path<TxHash>,
) -> ApiResult<TxReceipt> {
    state
        .ledger
        .read()
        .await
        .receipt(&tx_hash)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown transaction {tx_hash}")))
}

// ─── Board handlers ─────────────────────────────────────────────────────────

async fn count_handler(
    State(state): State<Arc<NodeState>>,
    Path(board): Path<Address>,
) -> ApiResult<CountResponse> {
    let ledger = state.ledger.read().await;
    let count = with_board(&ledger, &board, |b| b.message_count())?;
    Ok(Json(CountResponse { count }))
}

async fn messages_handler(
    State(state): State<Arc<NodeState>>,
    Path(board): Path<Address>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<MessageColumns> {
    if query.count == 0 || query.count > MAX_PAGE {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("count must be between 1 and {MAX_PAGE}"),
        ));
    }
    let ledger = state.ledger.read().await;
    with_board(&ledger, &board, |b| b.get_messages(query.start, query.count)).map(Json)
}

async fn message_handler(
    State(state): State<Arc<NodeState>>,
    Path((board, message_id)): Path<(Address, MessageId)>,
) -> ApiResult<Message> {
    let ledger = state.ledger.read().await;
    with_board(&ledger, &board, |b| b.get_message(message_id).cloned())?
        .map(Json)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))
}

async fn user_messages_handler(
    State(state): State<Arc<NodeState>>,
    Path((board, author)): Path<(Address, Address)>,
) -> ApiResult<UserMessagesResponse> {
    let ledger = state.ledger.read().await;
    let ids = with_board(&ledger, &board, |b| b.get_user_messages(&author))?;
    Ok(Json(UserMessagesResponse { ids }))
}

async fn protocol_id_handler(
    State(state): State<Arc<NodeState>>,
    Path(board): Path<Address>,
) -> ApiResult<ProtocolIdResponse> {
    let ledger = state.ledger.read().await;
    let protocol_id = with_board(&ledger, &board, |b| b.protocol_id())?;
    Ok(Json(ProtocolIdResponse { protocol_id }))
}

async fn events_handler(
    State(state): State<Arc<NodeState>>,
    Path(board): Path<Address>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<LoggedEvent>> {
    let ledger = state.ledger.read().await;
    with_board(&ledger, &board, |_| ())?;
    Ok(Json(ledger.events(&board, query.from_block)))
}

pub fn router(state: Arc<NodeState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chain", get(chain_handler))
        .route("/v1/tx", post(submit_handler))
        .route("/v1/tx/{tx_hash}", get(receipt_handler))
        .route("/v1/boards/{board}/count", get(count_handler))
        .route("/v1/boards/{board}/messages", get(messages_handler))
        .route("/v1/boards/{board}/messages/{message_id}", get(message_handler))
        .route("/v1/boards/{board}/users/{author}/messages", get(user_messages_handler))
        .route("/v1/boards/{board}/protocol-id", get(protocol_id_handler))
        .route("/v1/boards/{board}/events", get(events_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the node API on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<NodeState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

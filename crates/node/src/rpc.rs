//! HTTP RPC for transaction submission and chain queries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use powchain_chain::{Blockchain, Origin};
use powchain_core::{Address, Transaction};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

pub fn router(chain: Arc<Blockchain>) -> Router {
    Router::new()
        .route("/tx", post(submit_tx))
        .route("/head", get(head))
        .route("/account/:address", get(account))
        .route("/block/:number", get(block))
        .with_state(chain)
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn internal(e: impl std::fmt::Display) -> Response {
    error!(error = %e, "RPC request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
}

async fn submit_tx(State(chain): State<Arc<Blockchain>>, Json(tx): Json<Transaction>) -> Response {
    let result = tokio::task::spawn_blocking(move || chain.submit_transaction(tx, Origin::Local)).await;
    match result {
        Ok(Ok(hash)) => {
            debug!(tx = %hash.short(), "Transaction accepted over RPC");
            Json(json!({ "accepted": true, "hash": hash.to_hex() })).into_response()
        }
        Ok(Err(e)) if e.is_fatal() => internal(e),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e) => internal(e),
    }
}

async fn head(State(chain): State<Arc<Blockchain>>) -> Response {
    let head = chain.current_head();
    Json(json!({
        "number": head.number(),
        "hash": head.hash.to_hex(),
        "timestamp": head.header.timestamp,
    }))
    .into_response()
}

async fn account(State(chain): State<Arc<Blockchain>>, Path(address): Path<String>) -> Response {
    let Ok(address) = Address::from_hex(&address) else {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid address '{address}'"));
    };
    match chain.account(&address) {
        Ok(account) => Json(json!({
            "address": address.to_hex(),
            "balance": account.balance.to_string(),
            "nonce": account.nonce,
        }))
        .into_response(),
        Err(e) => internal(e),
    }
}

async fn block(State(chain): State<Arc<Blockchain>>, Path(number): Path<u64>) -> Response {
    match chain.get_block_by_number(number) {
        Ok(Some(block)) => Json(block).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("no block at height {number}")),
        Err(e) => internal(e),
    }
}

//! HTTP surface of a node.
//!
//! Thin request/response glue over [`Node`]; every route maps onto exactly
//! one node operation.  `GET /blockchain` is also the endpoint peers query
//! during resolution.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hc_blockchain::{Block, Blockchain, BlockchainError};
use hc_sync::{protocol::CHAIN_PATH, Peer, SyncError};
use hc_transaction::Transaction;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::{node::ResolutionReport, Node, NodeError};

/// Build the router for `node`.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/transaction", post(submit_transaction))
        .route("/block", post(mine_block))
        .route(CHAIN_PATH, get(blockchain))
        .route("/head", get(head))
        .route("/node", post(register_node).get(list_nodes))
        .route("/resolve", post(resolve))
        .with_state(node)
}

/// Serve the API on `listener` until the node is shut down.
pub async fn serve(node: Arc<Node>, listener: TcpListener) -> Result<(), NodeError> {
    let shutdown = node.shutdown_token();
    info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(node))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(tx): Json<Transaction>,
) -> Result<Json<Block>, ApiError> {
    Ok(Json(node.submit_transaction(tx).await?))
}

async fn mine_block(State(node): State<Arc<Node>>) -> Result<Json<Block>, ApiError> {
    Ok(Json(node.mine_pending().await?))
}

async fn blockchain(State(node): State<Arc<Node>>) -> Json<Blockchain> {
    Json(node.chain().await)
}

async fn head(State(node): State<Arc<Node>>) -> Result<Json<Block>, ApiError> {
    Ok(Json(node.head().await?))
}

async fn register_node(
    State(node): State<Arc<Node>>,
    Json(peer): Json<Peer>,
) -> Result<Json<Peer>, ApiError> {
    Ok(Json(node.register_peer(&peer.address).await?))
}

async fn list_nodes(State(node): State<Arc<Node>>) -> Json<Vec<Peer>> {
    Json(node.peers().await)
}

async fn resolve(State(node): State<Arc<Node>>) -> Result<Json<ResolutionReport>, ApiError> {
    Ok(Json(node.resolve().await?))
}

/// A [`NodeError`] rendered as `{"error": "..."}` with a matching status.
pub struct ApiError(NodeError);

impl<E: Into<NodeError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            NodeError::Blockchain(BlockchainError::AlreadyMined) => StatusCode::CONFLICT,
            NodeError::Blockchain(
                BlockchainError::AttemptsExhausted { .. }
                | BlockchainError::MiningTimeout { .. }
                | BlockchainError::MiningCancelled,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Sync(SyncError::InvalidPeerAddress(_)) => StatusCode::BAD_REQUEST,
            NodeError::Sync(SyncError::NoPeersResolved { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        let cases = [
            (
                ApiError::from(BlockchainError::AlreadyMined),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(BlockchainError::MiningCancelled),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(SyncError::InvalidPeerAddress(String::new())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(SyncError::NoPeersResolved { failures: vec![] }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(NodeError::Worker("panic".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }
}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::limit::RequestBodyLimitLayer;

use swarm_protocol::{NextTokenRequest, NextTokenResponse};

use crate::backend::Backend;
use crate::config::Config;

pub struct NodeState {
    pub config: Config,
    pub backend: Backend,
    /// Model codes this node currently holds a serve lease for
    pub held: RwLock<HashSet<String>>,
    pub started_at: DateTime<Utc>,
}

impl NodeState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            backend: Backend::new(&config.backend_url),
            config,
            held: RwLock::new(HashSet::new()),
            started_at: Utc::now(),
        })
    }
}

pub fn create_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/next_token", post(next_token_handler))
        .route("/api/status", get(status_handler))
        .route("/api/ping", post(ping_handler))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1MB
        .with_state(state)
}

async fn next_token_handler(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<NextTokenRequest>,
) -> Result<Json<NextTokenResponse>, StatusCode> {
    match state.backend.next_token(&req.model_id, &req.prompt, req.temperature).await {
        Ok(token) => Ok(Json(NextTokenResponse { token: Some(token) })),
        Err(e) => {
            tracing::warn!(model_id = %req.model_id, "Next-token failed: {e:#}");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

async fn status_handler(State(state): State<Arc<NodeState>>) -> Json<Value> {
    let uptime = Utc::now() - state.started_at;
    let mut held: Vec<String> = state.held.read().await.iter().cloned().collect();
    held.sort();
    Json(json!({
        "peerId": state.config.peer_id,
        "publicUrl": state.config.public_url,
        "registry": state.config.registry_url,
        "uptimeSecs": uptime.num_seconds(),
        "leases": held,
    }))
}

async fn ping_handler(State(state): State<Arc<NodeState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "peerId": state.config.peer_id,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

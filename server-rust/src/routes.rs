use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use swarm_protocol::*;

use crate::error::{ApiError, ApiResult};
use crate::lease::ServeLease;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/peers/register", post(register_peer))
        .route("/api/peers", get(list_peers))
        .route("/api/models", get(list_models))
        .route("/api/serve/claim", post(claim_serve))
        .route("/api/serve/release", post(release_serve))
        .route("/api/serve/{code}", get(current_lease))
        .route("/api/generate", post(generate))
        .route("/api/status", get(status))
        .with_state(state)
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

async fn register_peer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<RegisterResponse>> {
    let Json(req) = payload?;
    require("peerId", &req.peer_id)?;
    require("publicUrl", &req.public_url)?;

    let record = state.peers.register(req).await;
    Ok(Json(RegisterResponse {
        status: "ok".into(),
        model_count: record.models.len(),
        peer_id: record.peer_id,
    }))
}

async fn list_peers(State(state): State<Arc<AppState>>) -> Json<Vec<PeerRecord>> {
    Json(state.peers.list_live().await)
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<AggregatedListing>> {
    Json(state.listings().await)
}

async fn claim_serve(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<Json<ClaimResponse>> {
    let Json(req) = payload?;
    require("code", &req.code)?;
    require("peerId", &req.peer_id)?;
    let code = req.code.trim().to_ascii_lowercase();
    Ok(Json(state.leases.claim(&code, &req.peer_id).await))
}

async fn release_serve(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReleaseRequest>, JsonRejection>,
) -> ApiResult<Json<ReleaseResponse>> {
    let Json(req) = payload?;
    let code = req.code.trim().to_ascii_lowercase();
    let released = state.leases.release(&code, &req.peer_id).await;
    Ok(Json(ReleaseResponse { released }))
}

async fn current_lease(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<Option<ServeLease>> {
    let code = code.trim().to_ascii_lowercase();
    Json(state.leases.lease_at(&code, Utc::now()).await)
}

async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(req) = payload?;
    let listings = state.listings().await;
    let code = req.code.as_deref().unwrap_or_default();
    let out = state
        .router
        .generate(&listings, code, &req.prompt, req.clamped_max_tokens(), req.temperature)
        .await?;
    Ok(Json(GenerateResponse { text: out.text, tokens: out.tokens, code: out.code }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let now = Utc::now();
    let peers = state.peers.list_live_at(now).await;
    let models = crate::aggregate::aggregate(&peers);
    Json(json!({
        "peers": peers.len(),
        "models": models.len(),
        "activeLeases": state.leases.active_count_at(now).await,
        "uptimeSecs": (now - state.start_time).num_seconds(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::health::HealthReport;
use crate::cell::LatencyStats;
use crate::credential::{Credential, CredentialStore};
use crate::error::AppError;
use crate::panel::{Panel, PanelRegistry, PanelSnapshot, PredictionPanel};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<PanelRegistry>,
    pub prediction: Arc<PredictionPanel>,
    pub credentials: CredentialStore,
    pub latency: Arc<LatencyStats>,
    pub started_at: Instant,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/panels", get(list_panels))
        .route("/panels/:name", get(get_panel))
        .route("/panels/:name/enable", post(enable_panel))
        .route("/panels/:name/disable", post(disable_panel))
        .route("/panels/:name/refresh", post(refresh_panel))
        .route("/predictions/:match_id", post(submit_prediction))
        .route("/credential", put(save_credential).delete(clear_credential))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CredentialBody {
    pub football_api_key: String,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_panels(State(state): State<ApiState>) -> Json<Vec<PanelSnapshot>> {
    Json(state.registry.snapshots())
}

async fn get_panel(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<PanelSnapshot>, AppError> {
    Ok(Json(state.registry.get(&name)?.snapshot()))
}

async fn enable_panel(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<PanelSnapshot>, AppError> {
    let panel = state.registry.get(&name)?;
    panel.enable();
    Ok(Json(panel.snapshot()))
}

async fn disable_panel(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<PanelSnapshot>, AppError> {
    let panel = state.registry.get(&name)?;
    panel.disable();
    Ok(Json(panel.snapshot()))
}

async fn refresh_panel(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<PanelSnapshot>), AppError> {
    let panel = state.registry.get(&name)?;
    panel.trigger_refresh();
    Ok((StatusCode::ACCEPTED, Json(panel.snapshot())))
}

/// Runs the lookup to completion. Upstream failures are reported inside the
/// snapshot, not as an HTTP error.
async fn submit_prediction(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Result<Json<PanelSnapshot>, AppError> {
    state.prediction.submit(&match_id).await?;
    Ok(Json(state.prediction.snapshot()))
}

/// Persists the key for the next start. Running panels keep the credential
/// they were built with.
async fn save_credential(
    State(state): State<ApiState>,
    Json(body): Json<CredentialBody>,
) -> Result<StatusCode, AppError> {
    let credential = Credential::new(body.football_api_key)?;
    state.credentials.save(&credential)?;
    info!("Credential saved via API; applies from next start");
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_credential(State(state): State<ApiState>) -> Result<StatusCode, AppError> {
    state.credentials.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthReport> {
    let snapshots = state.registry.snapshots();
    Json(HealthReport::from_snapshots(
        &snapshots,
        state.started_at.elapsed().as_secs(),
    ))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let percentiles = state.latency.percentiles_ms();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms: percentiles.map(|p| p.0),
        p95_ms: percentiles.map(|p| p.1),
        p99_ms: percentiles.map(|p| p.2),
    })
}

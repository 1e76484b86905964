use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    models::EntityKind,
    store::{EntityFilter, EntityStore},
    AppState,
};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
    pub environment: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub store: ComponentHealth,
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/status", get(status))
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up")),
    tag = "health"
)]
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe with build metadata and an entity store check
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Ready", body = StatusResponse),
        (status = 503, description = "Entity store unavailable", body = StatusResponse)
    ),
    tag = "health"
)]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let probe = state
        .workflow
        .context()
        .store
        .query(&EntityFilter::new(EntityKind::Supplier))
        .await;
    let latency_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));

    let store = match probe {
        Ok(suppliers) => ComponentHealth {
            status: ComponentStatus::Up,
            message: format!("{} suppliers on record", suppliers.len()),
            latency_ms,
        },
        Err(e) => {
            warn!(error = %e, "entity store probe failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: e.response_message(),
                latency_ms,
            }
        }
    };

    let code = match store.status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = StatusResponse {
        status: store.status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_time: env!("BUILD_TIME").to_string(),
        environment: state.config.environment.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store,
    };
    (code, Json(body))
}

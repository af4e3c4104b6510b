//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: StorageHealth,
}

/// Storage backend health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageHealth {
    /// `"postgres"` or `"memory"`.
    pub backend: String,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Pings the database when one is configured. The in-memory store is always up.
async fn storage_health(state: &AppState) -> StorageHealth {
    match &state.pool {
        Some(pool) => {
            let start = std::time::Instant::now();
            let connected = sqlx::query("SELECT 1").execute(pool).await.is_ok();
            let latency_ms = start.elapsed().as_millis() as u64;
            StorageHealth {
                backend: "postgres".to_string(),
                connected,
                latency_ms: connected.then_some(latency_ms),
            }
        }
        None => StorageHealth {
            backend: "memory".to_string(),
            connected: true,
            latency_ms: None,
        },
    }
}

/// Full health check endpoint.
///
/// Returns 503 when the storage backend is unreachable.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let storage = storage_health(&state).await;
    if !storage.connected {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
    }))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if storage_health(&state).await.connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

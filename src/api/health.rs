//! Endpoints operativos: salud y métricas

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::errors::{internal_error, AppResult};

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: StoreHealth,
    pub timestamp: String,
}

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

/// Siempre 200: sin almacén el proxy sigue sirviendo desde el upstream
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store();
    let reachable = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("⚠️ Health check: almacén no disponible: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        store: StoreHealth {
            backend: store.backend(),
            reachable,
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn metrics(State(state): State<AppState>) -> AppResult<Response> {
    let text = state
        .photos
        .metrics()
        .render()
        .map_err(|e| internal_error(&e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        text,
    )
        .into_response())
}

//! API endpoints
//!
//! Este módulo contiene los endpoints de la API y el router principal.

pub mod completion;
pub mod health;
pub mod photos;

use axum::Router;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::cors::{cors_middleware, cors_middleware_with_origins};
use crate::state::AppState;

/// Crear el router principal de la API
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(photos::create_photos_router())
        .merge(health::create_health_router())
}

/// Router completo con middleware, listo para servir
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(cors_origins)
    };

    create_api_router()
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Sistema de manejo de errores
//!
//! Este módulo define los errores que llegan al borde HTTP y su conversión
//! a respuesta. El cliente sólo ve un mensaje genérico; el detalle queda en
//! los logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clients::UpstreamError;

pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream(e) => tracing::error!("❌ Error del upstream: {}", e),
            AppError::Internal(msg) => tracing::error!("❌ Error interno: {}", msg),
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": SERVER_ERROR_MESSAGE })),
        )
            .into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores internos
pub fn internal_error(message: &str) -> AppError {
    AppError::Internal(message.to_string())
}

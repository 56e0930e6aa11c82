//! Endpoints de fotos
//!
//! `GET /photos` y `GET /photos/:id` devuelven el JSON del upstream sin
//! modificar, desde cache cuando existe.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::completion::NotifyOnComplete;
use crate::services::CacheLookup;
use crate::state::AppState;
use crate::utils::errors::AppResult;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

pub fn create_photos_router() -> Router<AppState> {
    Router::new()
        .route("/photos", get(get_photos))
        .route("/photos/:id", get(get_photo))
}

async fn get_photos(State(state): State<AppState>) -> AppResult<Response> {
    let lookup = state.photos.fetch_collection().await?;
    Ok(respond(lookup))
}

async fn get_photo(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let lookup = state.photos.fetch_item(&id).await?;
    Ok(respond(lookup))
}

/// Arma la respuesta; si hay escritura diferida, la libera al fin del cuerpo
fn respond(lookup: CacheLookup) -> Response {
    let CacheLookup {
        payload,
        status,
        on_complete,
    } = lookup;

    let body = match on_complete {
        Some(done) => NotifyOnComplete::new(payload, done).into_body(),
        None => Body::from(payload),
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (
                header::HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(status.as_str()),
            ),
        ],
        body,
    )
        .into_response()
}

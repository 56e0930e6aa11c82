//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::services::PhotoCacheService;

#[derive(Clone)]
pub struct AppState {
    pub photos: Arc<PhotoCacheService>,
}

impl AppState {
    pub fn new(photos: PhotoCacheService) -> Self {
        Self {
            photos: Arc::new(photos),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        self.photos.store()
    }
}

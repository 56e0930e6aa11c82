//! Cache
//!
//! Este módulo contiene el adaptador del almacén (Redis o memoria), la
//! política de claves y la deduplicación de fetches en curso.

pub mod cache_config;
pub mod in_flight;
pub mod keys;
pub mod memory_store;
pub mod redis_client;
pub mod store;

use std::sync::Arc;

pub use cache_config::{CacheConfig, KeyStrategy, StoreBackend, StoreConfig, WritePolicy};
pub use keys::CacheKeys;
pub use memory_store::MemoryStore;
pub use redis_client::RedisClient;
pub use store::{CacheStore, StoreError, StoreResult};

/// Abrir el almacén configurado. Se llama una sola vez al arrancar.
pub async fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn CacheStore>> {
    match config.backend {
        StoreBackend::Redis => Ok(Arc::new(RedisClient::new(config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("🧠 Usando almacén en memoria: el cache no se comparte entre procesos");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

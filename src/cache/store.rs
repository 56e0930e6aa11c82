//! Contrato del almacén de cache
//!
//! Toda implementación (Redis, memoria) expone las mismas operaciones sobre
//! valores string con expiración. La ausencia de una clave nunca es un error:
//! sólo los fallos de conexión o de comando lo son.

use async_trait::async_trait;
use thiserror::Error;

/// Fallos del almacén. Para el orquestador todos significan "store no disponible".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store command timed out after {0}ms")]
    Timeout(u64),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operaciones del almacén clave-valor con expiración
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Valor guardado, o `None` si no existe o expiró.
    /// Un string vacío es un valor presente, distinto de `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Guarda el valor y reinicia su TTL.
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> StoreResult<()>;

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Aplica el TTL a la estructura completa. En un hash afecta a todos los campos.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()>;

    /// HSET seguido de EXPIRE. Las implementaciones pueden hacerlo atómico.
    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        ttl_secs: u64,
        value: &str,
    ) -> StoreResult<()> {
        self.hash_set(key, field, value).await?;
        self.expire(key, ttl_secs).await
    }

    async fn ping(&self) -> StoreResult<()>;

    /// Libera la conexión subyacente. Llamadas repetidas no tienen efecto.
    async fn shutdown(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

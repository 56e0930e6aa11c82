//! Configuración de cache
//!
//! Este módulo contiene la configuración de la política de cache: TTL,
//! estrategia de claves, momento de escritura y deduplicación de fetches.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Dónde viven las entradas de un item individual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Una clave independiente por identificador (`item:<id>`), cada una con su TTL
    PerItem,
    /// Un hash compartido (`photos:hash`); escribir un campo reinicia el TTL de todos
    Hash,
}

/// Cuándo se persiste en cache lo obtenido del upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Escribir en cache y después responder
    Sync,
    /// Responder primero; escribir cuando la respuesta terminó de enviarse
    Detached,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for KeyStrategy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_item" | "per-item" | "item" => Ok(KeyStrategy::PerItem),
            "hash" => Ok(KeyStrategy::Hash),
            other => Err(UnknownVariant {
                kind: "key strategy",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(WritePolicy::Sync),
            "detached" | "fire_and_forget" | "fire-and-forget" => Ok(WritePolicy::Detached),
            other => Err(UnknownVariant {
                kind: "write policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuración del cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub key_strategy: KeyStrategy,
    pub write_policy: WritePolicy,
    /// Compartir un único fetch upstream entre misses concurrentes de la misma clave
    pub coalesce: bool,
    pub namespace: Option<String>,
    /// Tiempo máximo para drenar escrituras pendientes al apagar
    pub shutdown_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS, // 1 hora
            key_strategy: KeyStrategy::PerItem,
            write_policy: WritePolicy::Detached,
            coalesce: true,
            namespace: None,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Implementación del almacén
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(UnknownVariant {
                kind: "cache backend",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuración de la conexión al almacén
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_millis(500),
        }
    }
}

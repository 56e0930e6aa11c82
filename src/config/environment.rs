//! Configuración de variables de entorno
//!
//! Este módulo lee la configuración del proceso. Todas las variables tienen
//! valor por defecto; un valor presente pero inválido es un error.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{CacheConfig, StoreConfig};
use crate::clients::photos_client::{UpstreamConfig, DEFAULT_UPSTREAM_BASE_URL};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            upstream: UpstreamConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración de las variables de entorno del proceso
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Leer la configuración desde cualquier fuente clave-valor
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let upstream = UpstreamConfig {
            base_url: var("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string()),
            timeout: Duration::from_secs(parse(&var, "UPSTREAM_TIMEOUT_SECS", 10)?),
        };

        let store = StoreConfig {
            backend: parse(&var, "CACHE_BACKEND", defaults.store.backend)?,
            redis_url: match var("REDIS_URL") {
                Some(url) => url,
                None => redis_url_from_parts(&var)?,
            },
            connect_timeout: defaults.store.connect_timeout,
            command_timeout: Duration::from_millis(parse(&var, "STORE_TIMEOUT_MS", 500)?),
        };

        let cache = CacheConfig {
            ttl_seconds: parse(&var, "CACHE_TTL_SECONDS", defaults.cache.ttl_seconds)?,
            key_strategy: parse(&var, "CACHE_KEY_STRATEGY", defaults.cache.key_strategy)?,
            write_policy: parse(&var, "CACHE_WRITE_POLICY", defaults.cache.write_policy)?,
            coalesce: parse(&var, "CACHE_COALESCE", defaults.cache.coalesce)?,
            namespace: var("CACHE_NAMESPACE"),
            shutdown_grace: Duration::from_secs(parse(&var, "SHUTDOWN_GRACE_SECS", 5)?),
        };

        if cache.ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "CACHE_TTL_SECONDS",
                value: "0".to_string(),
                reason: "TTL must be positive".to_string(),
            });
        }

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT", defaults.port)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            upstream,
            store,
            cache,
        })
    }

    /// Obtener la dirección del servidor
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, V>(var: &V, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Construir la URL de Redis a partir de host, puerto y credenciales
fn redis_url_from_parts<V>(var: &V) -> Result<String, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let host = var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = parse(var, "REDIS_PORT", 6379)?;
    let db: u32 = parse(var, "REDIS_DB", 0)?;

    let credentials = match (var("REDIS_USERNAME"), var("REDIS_PASSWORD")) {
        (Some(user), Some(pass)) => format!(
            "{}:{}@",
            urlencoding::encode(&user),
            urlencoding::encode(&pass)
        ),
        (None, Some(pass)) => format!(":{}@", urlencoding::encode(&pass)),
        (Some(user), None) => format!("{}@", urlencoding::encode(&user)),
        (None, None) => String::new(),
    };

    Ok(format!("redis://{}{}:{}/{}", credentials, host, port, db))
}

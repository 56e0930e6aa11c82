use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use tracing::{debug, info, warn};

use super::store::{CacheStore, StoreError, StoreResult};
use super::StoreConfig;

/// Cliente Redis compartido por todo el proceso
///
/// `ConnectionManager` multiplexa los comandos sobre una sola conexión y se
/// clona barato; no hace falta locking del lado del cliente.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    command_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl RedisClient {
    /// Crear nuevo cliente Redis. Falla si el servidor no responde al PING.
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        info!("🔗 Conectando a Redis: {}", mask_url(&config.redis_url));

        let client = redis::Client::open(config.redis_url.as_str())?;
        let manager = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout.as_millis() as u64))??;

        let redis = Self {
            manager,
            command_timeout: config.command_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        };

        // Test de conexión usando un comando simple
        redis.ping().await?;

        info!("✅ Redis conectado exitosamente");
        Ok(redis)
    }

    /// Ejecutar un comando con el timeout configurado
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.command_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.command_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl CacheStore for RedisClient {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = self.run(conn.get(key)).await?;
        debug!("📥 Redis GET {} -> {}", key, if value.is_some() { "HIT" } else { "MISS" });
        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        self.run(conn.set_ex::<_, _, ()>(key, value, ttl_secs)).await?;
        debug!("💾 Redis SETEX {} (TTL: {}s)", key, ttl_secs);
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        self.run(conn.hget(key, field)).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        self.run(conn.hset::<_, _, _, ()>(key, field, value)).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl_secs);
        self.run(cmd.query_async::<_, ()>(&mut conn)).await
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        ttl_secs: u64,
        value: &str,
    ) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(key, field, value)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .ignore();
        self.run(pipe.query_async::<_, ()>(&mut conn)).await?;
        debug!("💾 Redis HSET {} {} + EXPIRE {}s", key, field, ttl_secs);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let response: String = self.run(redis::cmd("PING").query_async(&mut conn)).await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply: {}", response)))
        }
    }

    async fn shutdown(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("🔌 Cerrando conexión Redis");
        let mut conn = self.manager.clone();
        // El servidor cierra el socket tras QUIT; un error aquí no cambia nada
        if let Err(e) = self.run(redis::cmd("QUIT").query_async::<_, ()>(&mut conn)).await {
            warn!("⚠️ QUIT de Redis falló: {}", e);
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Enmascarar credenciales de la URL en logs
pub fn mask_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    match url.rfind('@') {
        Some(at_pos) if at_pos > scheme_end => {
            format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}

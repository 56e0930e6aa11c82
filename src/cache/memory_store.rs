//! Almacén en memoria con expiración
//!
//! Misma semántica que Redis para las operaciones que usa el proxy: TTL por
//! clave, y en los hashes un único TTL para toda la estructura. Usa el reloj
//! de tokio para que los tests puedan avanzar el tiempo.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::store::{CacheStore, StoreResult};

#[derive(Debug)]
enum Value {
    Plain(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
}

/// Cada escritura barre las entradas expiradas, aunque nadie vuelva a pedirlas
fn sweep_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, entry| entry.is_live(now));
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entradas vivas (las expiradas se purgan al consultarse)
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        sweep_expired(&mut entries, Instant::now());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segundos restantes de vida de una clave
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.lock();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock();
        purge_expired(&mut entries, key, now);
        match entries.get(key) {
            Some(Entry { value: Value::Plain(value), .. }) => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> StoreResult<()> {
        let now = Instant::now();
        let entry = Entry {
            value: Value::Plain(value.to_string()),
            expires_at: Some(now + Duration::from_secs(ttl_secs)),
        };
        let mut entries = self.lock();
        sweep_expired(&mut entries, now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock();
        purge_expired(&mut entries, key, now);
        match entries.get(key) {
            Some(Entry { value: Value::Hash(fields), .. }) => Ok(fields.get(field).cloned()),
            _ => Ok(None),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let now = Instant::now();
        let mut entries = self.lock();
        sweep_expired(&mut entries, now);
        let reusable = matches!(
            entries.get(key),
            Some(entry) if entry.is_live(now) && matches!(entry.value, Value::Hash(_))
        );
        if !reusable {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        if let Some(Entry { value: Value::Hash(fields), .. }) = entries.get_mut(key) {
            fields.insert(field.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        let now = Instant::now();
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_live(now) {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
            }
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

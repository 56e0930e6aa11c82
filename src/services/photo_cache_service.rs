//! Cache read-through para la API de fotos
//!
//! Consulta el almacén; en un miss va al upstream, devuelve el payload y lo
//! persiste con el TTL configurado. El cache es una optimización: un almacén
//! caído se trata como miss y un fallo de escritura sólo se registra.
//!
//! La escritura se decide dentro del fetch compartido, así que no depende de
//! qué petición llegó primero ni de si esa petición sigue viva.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::cache::in_flight::{InFlight, Role};
use crate::cache::{CacheConfig, CacheKeys, CacheStore, KeyStrategy, WritePolicy};
use crate::clients::{photos_client::is_valid_payload, PhotoSource, UpstreamError};
use crate::utils::metrics::CacheMetrics;

/// Granularidad del recurso pedido
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Collection,
    Item(String),
}

impl Resource {
    fn label(&self) -> &'static str {
        match self {
            Resource::Collection => "collection",
            Resource::Item(_) => "item",
        }
    }
}

/// Ubicación de una entrada dentro del almacén
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSlot {
    Key(String),
    HashField { key: String, field: String },
}

impl CacheSlot {
    fn id(&self) -> String {
        match self {
            CacheSlot::Key(key) => key.clone(),
            CacheSlot::HashField { key, field } => format!("{}#{}", key, field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Resultado de una consulta al cache read-through
pub struct CacheLookup {
    pub payload: String,
    pub status: CacheStatus,
    /// Con política `detached`: enviar (o soltar) cuando la respuesta termine
    /// libera la escritura ya programada
    pub on_complete: Option<oneshot::Sender<()>>,
}

/// Aviso de fin de respuesta para una escritura diferida. Lo comparten todas
/// las peticiones unidas al mismo fetch y se lo queda la primera que lo pide.
#[derive(Clone)]
struct CompletionTrigger(Arc<Mutex<Option<oneshot::Sender<()>>>>);

impl CompletionTrigger {
    fn new(done: oneshot::Sender<()>) -> Self {
        Self(Arc::new(Mutex::new(Some(done))))
    }

    fn claim(&self) -> Option<oneshot::Sender<()>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Lo que produce un fetch upstream compartido
#[derive(Clone)]
struct Fetched {
    payload: String,
    trigger: Option<CompletionTrigger>,
}

type FetchOutcome = Result<Fetched, UpstreamError>;

/// Escritura en cache ya preparada
struct CacheWrite {
    store: Arc<dyn CacheStore>,
    slot: CacheSlot,
    value: String,
    ttl_secs: u64,
    metrics: CacheMetrics,
}

impl CacheWrite {
    /// Persiste el valor. Los errores se registran y no se propagan.
    async fn persist(self) -> bool {
        let result = match &self.slot {
            CacheSlot::Key(key) => {
                self.store
                    .set_with_expiry(key, self.ttl_secs, &self.value)
                    .await
            }
            CacheSlot::HashField { key, field } => {
                self.store
                    .hash_set_with_expiry(key, field, self.ttl_secs, &self.value)
                    .await
            }
        };

        match result {
            Ok(()) => {
                debug!("💾 Cache SET {} (TTL: {}s)", self.slot.id(), self.ttl_secs);
                self.metrics.write(true);
                true
            }
            Err(e) => {
                warn!("⚠️ No se pudo guardar {} en cache: {}", self.slot.id(), e);
                self.metrics.write(false);
                false
            }
        }
    }

    /// Lanza la escritura como tarea separada; arranca cuando se envía el
    /// aviso devuelto (respuesta entregada) o cuando se descarta.
    fn detach(self, tasks: &TaskTracker) -> CompletionTrigger {
        let (done, signal) = oneshot::channel::<()>();
        tasks.spawn(async move {
            if signal.await.is_err() {
                debug!("🔌 Respuesta abandonada antes de completarse: {}", self.slot.id());
            }
            self.persist().await;
        });
        CompletionTrigger::new(done)
    }
}

pub struct PhotoCacheService {
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn PhotoSource>,
    config: CacheConfig,
    keys: CacheKeys,
    in_flight: InFlight<FetchOutcome>,
    metrics: CacheMetrics,
    tasks: TaskTracker,
}

impl PhotoCacheService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn PhotoSource>,
        config: CacheConfig,
        metrics: CacheMetrics,
    ) -> Self {
        let keys = CacheKeys::new(config.namespace.clone());
        Self {
            store,
            upstream,
            config,
            keys,
            in_flight: InFlight::new(),
            metrics,
            tasks: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Colección completa
    pub async fn fetch_collection(&self) -> Result<CacheLookup, UpstreamError> {
        self.fetch(Resource::Collection).await
    }

    /// Un único item; `id` se usa tal cual en la clave
    pub async fn fetch_item(&self, id: &str) -> Result<CacheLookup, UpstreamError> {
        self.fetch(Resource::Item(id.to_string())).await
    }

    pub fn slot_for(&self, resource: &Resource) -> CacheSlot {
        match (resource, self.config.key_strategy) {
            (Resource::Collection, _) => CacheSlot::Key(self.keys.collection()),
            (Resource::Item(id), KeyStrategy::PerItem) => CacheSlot::Key(self.keys.item(id)),
            (Resource::Item(id), KeyStrategy::Hash) => CacheSlot::HashField {
                key: self.keys.item_hash(),
                field: id.clone(),
            },
        }
    }

    async fn fetch(&self, resource: Resource) -> Result<CacheLookup, UpstreamError> {
        let label = resource.label();
        let slot = self.slot_for(&resource);

        if let Some(payload) = self.read_cached(&slot, label).await {
            return Ok(CacheLookup {
                payload,
                status: CacheStatus::Hit,
                on_complete: None,
            });
        }

        let fetched = self.fetch_upstream(slot, resource).await?;
        Ok(CacheLookup {
            payload: fetched.payload,
            status: CacheStatus::Miss,
            on_complete: fetched.trigger.and_then(|trigger| trigger.claim()),
        })
    }

    /// Lectura tolerante: errores del almacén y valores corruptos cuentan como miss
    async fn read_cached(&self, slot: &CacheSlot, label: &str) -> Option<String> {
        let read = match slot {
            CacheSlot::Key(key) => self.store.get(key).await,
            CacheSlot::HashField { key, field } => self.store.hash_get(key, field).await,
        };

        match read {
            Ok(Some(value)) if is_valid_payload(&value) => {
                debug!("📥 Cache HIT {}", slot.id());
                self.metrics.lookup(label, "hit");
                Some(value)
            }
            Ok(Some(_)) => {
                warn!("⚠️ Valor corrupto en cache para {}, se ignora", slot.id());
                self.metrics.lookup(label, "malformed");
                None
            }
            Ok(None) => {
                debug!("❌ Cache MISS {}", slot.id());
                self.metrics.lookup(label, "miss");
                None
            }
            Err(e) => {
                warn!("⚠️ Cache no disponible leyendo {}: {}", slot.id(), e);
                self.metrics.lookup(label, "store_error");
                None
            }
        }
    }

    /// Fetch upstream más escritura en cache, como un único futuro. Con
    /// `sync` la escritura termina antes de resolver, para todos los que
    /// esperan; con `detached` queda programada en el tracker.
    async fn fetch_upstream(&self, slot: CacheSlot, resource: Resource) -> FetchOutcome {
        let label = resource.label();
        let key = slot.id();
        let upstream = self.upstream.clone();
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let tasks = self.tasks.clone();
        let ttl_secs = self.config.ttl_seconds;
        let write_policy = self.config.write_policy;

        let fetch = async move {
            let result = match &resource {
                Resource::Collection => upstream.fetch_collection().await,
                Resource::Item(id) => upstream.fetch_item(id).await,
            };
            let payload = match result {
                Ok(payload) => {
                    metrics.upstream(label, "ok");
                    payload
                }
                Err(e) => {
                    error!("❌ Fetch upstream de {:?} falló: {}", resource, e);
                    metrics.upstream(label, e.kind());
                    return Err(e);
                }
            };

            let write = CacheWrite {
                store,
                slot,
                value: payload.clone(),
                ttl_secs,
                metrics,
            };
            let trigger = match write_policy {
                WritePolicy::Sync => {
                    write.persist().await;
                    None
                }
                WritePolicy::Detached => Some(write.detach(&tasks)),
            };
            Ok(Fetched { payload, trigger })
        };

        if !self.config.coalesce {
            return fetch.await;
        }

        let (outcome, role) = self.in_flight.run(&key, fetch).await;
        if role == Role::Follower {
            self.metrics.coalesced();
        }
        outcome
    }

    /// Espera a las escrituras pendientes, como máximo `grace`
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if drained {
            info!("✅ Escrituras de cache pendientes completadas");
        } else {
            warn!("⚠️ Quedaron {} escrituras de cache sin completar", self.tasks.len());
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubSource {
        calls: AtomicUsize,
        items: HashMap<String, Result<String, UpstreamError>>,
        delay: Option<Duration>,
    }

    impl StubSource {
        fn with_item(mut self, id: &str, result: Result<&str, UpstreamError>) -> Self {
            self.items.insert(id.to_string(), result.map(str::to_string));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PhotoSource for StubSource {
        async fn fetch_collection(&self) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("[{\"id\":1}]".to_string())
        }

        async fn fetch_item(&self, id: &str) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.items
                .get(id)
                .cloned()
                .unwrap_or(Err(UpstreamError::Status(404)))
        }
    }

    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn set_with_expiry(&self, _key: &str, _ttl: u64, _value: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn hash_get(&self, _key: &str, _field: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Timeout(500))
        }
        async fn hash_set(&self, _key: &str, _field: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Timeout(500))
        }
        async fn expire(&self, _key: &str, _ttl: u64) -> StoreResult<()> {
            Err(StoreError::Timeout(500))
        }
        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        fn backend(&self) -> &'static str {
            "down"
        }
    }

    /// Almacén en memoria con escrituras lentas
    struct SlowStore {
        inner: MemoryStore,
        write_delay: Duration,
    }

    impl SlowStore {
        fn new(write_delay: Duration) -> Self {
            Self {
                inner: MemoryStore::new(),
                write_delay,
            }
        }
    }

    #[async_trait]
    impl CacheStore for SlowStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn set_with_expiry(&self, key: &str, ttl: u64, value: &str) -> StoreResult<()> {
            tokio::time::sleep(self.write_delay).await;
            self.inner.set_with_expiry(key, ttl, value).await
        }
        async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
            self.inner.hash_get(key, field).await
        }
        async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
            tokio::time::sleep(self.write_delay).await;
            self.inner.hash_set(key, field, value).await
        }
        async fn expire(&self, key: &str, ttl: u64) -> StoreResult<()> {
            self.inner.expire(key, ttl).await
        }
        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }
        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    fn service(
        store: Arc<dyn CacheStore>,
        source: Arc<StubSource>,
        config: CacheConfig,
    ) -> PhotoCacheService {
        PhotoCacheService::new(store, source, config, CacheMetrics::new().unwrap())
    }

    fn sync_config() -> CacheConfig {
        CacheConfig {
            write_policy: WritePolicy::Sync,
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_miss_populates_then_hits() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("3", Ok("{\"id\":3,\"title\":\"foo\"}")));
        let service = service(store.clone(), source.clone(), sync_config());

        let first = service.fetch_item("3").await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.payload, "{\"id\":3,\"title\":\"foo\"}");
        assert!(first.on_complete.is_none());
        assert_eq!(
            store.get("item:3").await.unwrap().as_deref(),
            Some("{\"id\":3,\"title\":\"foo\"}")
        );

        let second = service.fetch_item("3").await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.payload, first.payload);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_uses_fixed_key() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default());
        let service = service(store.clone(), source.clone(), sync_config());

        service.fetch_collection().await.unwrap();
        let hit = service.fetch_collection().await.unwrap();
        assert_eq!(hit.status, CacheStatus::Hit);
        assert_eq!(store.get("photos").await.unwrap().as_deref(), Some("[{\"id\":1}]"));
        assert_eq!(source.calls(), 1);
        assert_eq!(store.ttl("photos"), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_detached_policy_defers_write() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("5", Ok("{\"id\":5}")));
        let service = service(store.clone(), source, CacheConfig::default());

        let lookup = service.fetch_item("5").await.unwrap();
        let done = lookup.on_complete.expect("write should be deferred");
        tokio::task::yield_now().await;
        assert_eq!(store.get("item:5").await.unwrap(), None);

        done.send(()).unwrap();
        assert!(service.drain(Duration::from_secs(1)).await);
        assert_eq!(store.get("item:5").await.unwrap().as_deref(), Some("{\"id\":5}"));
    }

    #[tokio::test]
    async fn test_dropped_signal_still_persists() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("6", Ok("{}")));
        let service = service(store.clone(), source, CacheConfig::default());

        let lookup = service.fetch_item("6").await.unwrap();
        assert!(lookup.on_complete.is_some());
        drop(lookup);

        assert!(service.drain(Duration::from_secs(1)).await);
        assert_eq!(store.get("item:6").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("9", Err(UpstreamError::Timeout)));
        let service = service(store.clone(), source, sync_config());

        let err = service.fetch_item("9").await.err().unwrap();
        assert_eq!(err, UpstreamError::Timeout);
        assert!(store.is_empty());
        assert_eq!(service.metrics().upstream_count("item", "timeout"), 1);
    }

    #[tokio::test]
    async fn test_store_down_degrades_to_upstream() {
        let source = Arc::new(StubSource::default().with_item("1", Ok("{\"id\":1}")));
        let service = service(Arc::new(DownStore), source.clone(), sync_config());

        let first = service.fetch_item("1").await.unwrap();
        let second = service.fetch_item("1").await.unwrap();
        assert_eq!(first.payload, "{\"id\":1}");
        assert_eq!(second.status, CacheStatus::Miss);
        assert_eq!(source.calls(), 2);
        assert_eq!(service.metrics().lookup_count("item", "store_error"), 2);
    }

    #[tokio::test]
    async fn test_store_down_with_hash_strategy() {
        let source = Arc::new(StubSource::default().with_item("1", Ok("{\"id\":1}")));
        let config = CacheConfig {
            key_strategy: KeyStrategy::Hash,
            ..sync_config()
        };
        let service = service(Arc::new(DownStore), source, config);
        assert_eq!(service.fetch_item("1").await.unwrap().payload, "{\"id\":1}");
    }

    #[tokio::test]
    async fn test_malformed_cached_value_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.set_with_expiry("item:2", 60, "{not json").await.unwrap();
        let source = Arc::new(StubSource::default().with_item("2", Ok("{\"id\":2}")));
        let service = service(store.clone(), source.clone(), sync_config());

        let lookup = service.fetch_item("2").await.unwrap();
        assert_eq!(lookup.status, CacheStatus::Miss);
        assert_eq!(lookup.payload, "{\"id\":2}");
        assert_eq!(store.get("item:2").await.unwrap().as_deref(), Some("{\"id\":2}"));
        assert_eq!(service.metrics().lookup_count("item", "malformed"), 1);
    }

    #[tokio::test]
    async fn test_null_and_empty_payloads_are_cached() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            StubSource::default()
                .with_item("null", Ok("null"))
                .with_item("empty", Ok("")),
        );
        let service = service(store.clone(), source.clone(), sync_config());

        service.fetch_item("null").await.unwrap();
        service.fetch_item("empty").await.unwrap();
        assert_eq!(service.fetch_item("null").await.unwrap().status, CacheStatus::Hit);
        let empty = service.fetch_item("empty").await.unwrap();
        assert_eq!(empty.status, CacheStatus::Hit);
        assert_eq!(empty.payload, "");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_hash_strategy_groups_items() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            StubSource::default()
                .with_item("1", Ok("{\"id\":1}"))
                .with_item("2", Ok("{\"id\":2}")),
        );
        let config = CacheConfig {
            key_strategy: KeyStrategy::Hash,
            ..sync_config()
        };
        let service = service(store.clone(), source.clone(), config);

        service.fetch_item("1").await.unwrap();
        service.fetch_item("2").await.unwrap();
        assert_eq!(
            store.hash_get("photos:hash", "1").await.unwrap().as_deref(),
            Some("{\"id\":1}")
        );
        assert_eq!(store.get("item:1").await.unwrap(), None);
        assert_eq!(service.fetch_item("2").await.unwrap().status, CacheStatus::Hit);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_namespace_prefixes_keys() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("4", Ok("{}")));
        let config = CacheConfig {
            namespace: Some("proxy".to_string()),
            ..sync_config()
        };
        let service = service(store.clone(), source, config);

        service.fetch_item("4").await.unwrap();
        assert!(store.get("proxy:item:4").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_refetched_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::default().with_item("8", Ok("{\"id\":8}")));
        let config = CacheConfig {
            ttl_seconds: 30,
            ..sync_config()
        };
        let service = service(store, source.clone(), config);

        service.fetch_item("8").await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(service.fetch_item("8").await.unwrap().status, CacheStatus::Hit);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(service.fetch_item("8").await.unwrap().status, CacheStatus::Miss);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource {
            delay: Some(Duration::from_millis(50)),
            ..StubSource::default()
        }.with_item("7", Ok("{\"id\":7}")));
        let service = service(store.clone(), source.clone(), CacheConfig::default());

        let (a, b, c) = tokio::join!(
            service.fetch_item("7"),
            service.fetch_item("7"),
            service.fetch_item("7"),
        );
        let lookups = [a.unwrap(), b.unwrap(), c.unwrap()];

        assert_eq!(source.calls(), 1);
        assert_eq!(lookups.iter().filter(|l| l.on_complete.is_some()).count(), 1);
        assert!(lookups.iter().all(|l| l.payload == "{\"id\":7}"));
        assert_eq!(service.metrics().upstream_count("item", "ok"), 1);
    }

    #[tokio::test]
    async fn test_without_coalescing_each_miss_fetches() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource {
            delay: Some(Duration::from_millis(50)),
            ..StubSource::default()
        }.with_item("7", Ok("{\"id\":7}")));
        let config = CacheConfig {
            coalesce: false,
            ..sync_config()
        };
        let service = service(store.clone(), source.clone(), config);

        let (a, b) = tokio::join!(service.fetch_item("7"), service.fetch_item("7"));
        assert_eq!(a.unwrap().payload, b.unwrap().payload);
        assert_eq!(source.calls(), 2);
        assert_eq!(store.get("item:7").await.unwrap().as_deref(), Some("{\"id\":7}"));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let source = Arc::new(StubSource::default().with_item("1", Ok("{}")));
        let service = service(Arc::new(DownStore), source, CacheConfig::default());

        let lookup = service.fetch_item("1").await.unwrap();
        assert_eq!(lookup.payload, "{}");
        drop(lookup);

        assert!(service.drain(Duration::from_secs(1)).await);
        assert_eq!(service.metrics().write_count(false), 1);
        assert_eq!(service.metrics().write_count(true), 0);
    }

    #[tokio::test]
    async fn test_sync_policy_joined_requests_wait_for_write() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(300)));
        let source = Arc::new(StubSource::default().with_item("3", Ok("{\"id\":3}")));
        let service = Arc::new(service(store.clone(), source.clone(), sync_config()));

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.fetch_item("3").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let joined = service.fetch_item("3").await.unwrap();
        assert_eq!(joined.status, CacheStatus::Miss);
        assert_eq!(
            store.inner.get("item:3").await.unwrap().as_deref(),
            Some("{\"id\":3}")
        );

        first.await.unwrap().unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(service.metrics().write_count(true), 1);
    }

    #[tokio::test]
    async fn test_cancelled_first_request_still_caches_for_joined_one() {
        for policy in [WritePolicy::Detached, WritePolicy::Sync] {
            let store = Arc::new(MemoryStore::new());
            let source = Arc::new(StubSource {
                delay: Some(Duration::from_millis(100)),
                ..StubSource::default()
            }.with_item("7", Ok("{\"id\":7}")));
            let config = CacheConfig {
                write_policy: policy,
                ..CacheConfig::default()
            };
            let service = Arc::new(service(store.clone(), source.clone(), config));

            let first = tokio::spawn({
                let service = service.clone();
                async move { service.fetch_item("7").await }
            });
            tokio::time::sleep(Duration::from_millis(20)).await;

            let joined = tokio::spawn({
                let service = service.clone();
                async move { service.fetch_item("7").await }
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
            first.abort();

            let lookup = joined.await.unwrap().unwrap();
            assert_eq!(lookup.payload, "{\"id\":7}");
            assert_eq!(lookup.on_complete.is_some(), policy == WritePolicy::Detached);
            drop(lookup);

            assert!(service.drain(Duration::from_secs(1)).await);
            assert_eq!(
                store.get("item:7").await.unwrap().as_deref(),
                Some("{\"id\":7}"),
                "{:?}",
                policy
            );
            assert_eq!(source.calls(), 1);
        }
    }
}

//! Métricas Prometheus del proxy
//!
//! Cada instancia tiene su propio `Registry`, así los tests no comparten
//! contadores globales.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct CacheMetrics {
    registry: Registry,
    lookups: IntCounterVec,
    upstream_requests: IntCounterVec,
    cache_writes: IntCounterVec,
    coalesced_waiters: IntCounter,
}

impl CacheMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let lookups = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Cache lookups by outcome"),
            &["resource", "outcome"],
        )?;
        let upstream_requests = IntCounterVec::new(
            Opts::new("upstream_requests_total", "Upstream fetches by result"),
            &["resource", "result"],
        )?;
        let cache_writes = IntCounterVec::new(
            Opts::new("cache_writes_total", "Cache writes by result"),
            &["result"],
        )?;
        let coalesced_waiters = IntCounter::with_opts(Opts::new(
            "coalesced_waiters_total",
            "Requests that joined an in-flight upstream fetch",
        ))?;

        registry.register(Box::new(lookups.clone()))?;
        registry.register(Box::new(upstream_requests.clone()))?;
        registry.register(Box::new(cache_writes.clone()))?;
        registry.register(Box::new(coalesced_waiters.clone()))?;

        Ok(Self {
            registry,
            lookups,
            upstream_requests,
            cache_writes,
            coalesced_waiters,
        })
    }

    /// `outcome`: hit, miss, malformed, store_error
    pub fn lookup(&self, resource: &str, outcome: &str) {
        self.lookups.with_label_values(&[resource, outcome]).inc();
    }

    /// `result`: ok, o el tipo de error del upstream
    pub fn upstream(&self, resource: &str, result: &str) {
        self.upstream_requests.with_label_values(&[resource, result]).inc();
    }

    pub fn write(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.cache_writes.with_label_values(&[result]).inc();
    }

    pub fn coalesced(&self) {
        self.coalesced_waiters.inc();
    }

    pub fn lookup_count(&self, resource: &str, outcome: &str) -> u64 {
        self.lookups.with_label_values(&[resource, outcome]).get()
    }

    pub fn upstream_count(&self, resource: &str, result: &str) -> u64 {
        self.upstream_requests.with_label_values(&[resource, result]).get()
    }

    pub fn write_count(&self, ok: bool) -> u64 {
        let result = if ok { "ok" } else { "error" };
        self.cache_writes.with_label_values(&[result]).get()
    }

    /// Exposición en formato texto
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

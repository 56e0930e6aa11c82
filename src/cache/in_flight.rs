//! Deduplicación de fetches upstream en curso
//!
//! Los misses concurrentes sobre la misma clave comparten un único futuro.
//! El futuro sigue avanzando mientras quede alguien esperándolo, aunque el
//! primero en llegar (el líder) haya sido cancelado.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

type SharedFetch<T> = Shared<BoxFuture<'static, T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

struct Pending<T: Clone> {
    fetches: HashMap<String, (u64, SharedFetch<T>)>,
}

#[derive(Clone)]
pub struct InFlight<T: Clone> {
    pending: Arc<Mutex<Pending<T>>>,
    generation: Arc<AtomicU64>,
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending {
                fetches: HashMap::new(),
            })),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Retira la entrada del líder al terminar o al ser cancelado
struct LeaderGuard<T: Clone> {
    pending: Arc<Mutex<Pending<T>>>,
    key: String,
    generation: u64,
}

impl<T: Clone> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        let mut pending = lock(&self.pending);
        if matches!(pending.fetches.get(&self.key), Some((generation, _)) if *generation == self.generation)
        {
            pending.fetches.remove(&self.key);
        }
    }
}

fn lock<T: Clone>(pending: &Mutex<Pending<T>>) -> MutexGuard<'_, Pending<T>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Ejecuta `fetch` o se une al que ya está en curso para `key`
    pub async fn run<F>(&self, key: &str, fetch: F) -> (T, Role)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (shared, guard) = {
            let mut pending = lock(&self.pending);
            match pending.fetches.get(key) {
                Some((_, shared)) => (shared.clone(), None),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let shared = fetch.boxed().shared();
                    pending
                        .fetches
                        .insert(key.to_string(), (generation, shared.clone()));
                    let guard = LeaderGuard {
                        pending: self.pending.clone(),
                        key: key.to_string(),
                        generation,
                    };
                    (shared, Some(guard))
                }
            }
        };

        let role = if guard.is_some() {
            Role::Leader
        } else {
            debug!("🔗 Uniéndose al fetch en curso para {}", key);
            Role::Follower
        };

        let result = shared.await;
        drop(guard);
        (result, role)
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).fetches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

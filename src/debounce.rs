//! Debouncing of document validation.
//!
//! Each key has at most one pending payload and one timer. Scheduling again for
//! the same key replaces the payload and restarts the timer, so a burst of
//! changes fires once, with the last payload, after the quiet period.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

struct Pending<T> {
    generation: u64,
    payload: T,
    timer: Option<JoinHandle<()>>,
}

impl<T> Pending<T> {
    fn cancel(self) -> T {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        self.payload
    }
}

pub struct Debouncer<K, T> {
    delay: Duration,
    generation: AtomicU64,
    pending: Arc<DashMap<K, Pending<T>>>,
}

impl<K: Eq + Hash, T> std::fmt::Debug for Debouncer<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<K, T> Debouncer<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Stage `payload` for `key` and (re)start its timer. When the timer runs
    /// out, `on_fire` gets the payload. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, key: K, payload: T, on_fire: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if let Some((_, previous)) = self.pending.remove(&key) {
            previous.cancel();
        }
        self.pending.insert(
            key.clone(),
            Pending {
                generation,
                payload,
                timer: None,
            },
        );

        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some((_, entry)) = pending.remove_if(&timer_key, |_, p| p.generation == generation)
            else {
                return;
            };
            on_fire(entry.payload).await;
        });

        // The timer may already have fired; then there is nothing to attach to.
        if let Some(mut entry) = self.pending.get_mut(&key) {
            if entry.generation == generation {
                entry.timer = Some(timer);
            }
        }
    }

    /// Take the staged payload now and stop its timer.
    pub fn flush(&self, key: &K) -> Option<T> {
        self.pending.remove(key).map(|(_, entry)| entry.cancel())
    }

    /// Drop the staged payload without firing.
    pub fn cancel(&self, key: &K) {
        if self.flush(key).is_some() {
            tracing::debug!("pending validation cancelled");
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }
}

#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use front_cache::{Fetched, Fetcher};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Fetcher that records how often, and how concurrently, each key is fetched.
#[derive(Clone)]
pub struct CountingFetcher {
    inner: Arc<Counters>,
    delay: Duration,
    ttl: Duration,
}

#[derive(Default)]
struct Counters {
    calls: Mutex<HashMap<String, usize>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: AtomicUsize,
}

impl CountingFetcher {
    /// Creates a fetcher answering `"value of <key>"` after `delay`.
    pub fn new(delay: Duration, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Counters::default()),
            delay,
            ttl,
        }
    }

    /// Number of fetches performed for `key`.
    pub fn calls(&self, key: &str) -> usize {
        self.inner.calls.lock().get(key).copied().unwrap_or(0)
    }

    /// Total number of fetches across all keys.
    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().values().sum()
    }

    /// Highest number of simultaneous fetches seen for any single key.
    pub fn max_in_flight_per_key(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, key: &str) -> Fetched {
        *self.inner.calls.lock().entry(key.to_string()).or_default() += 1;

        let current = {
            let mut in_flight = self.inner.in_flight.lock();
            let slot = in_flight.entry(key.to_string()).or_default();
            *slot += 1;
            *slot
        };
        self.inner.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(slot) = self.inner.in_flight.lock().get_mut(key) {
            *slot -= 1;
        }

        Fetched::new(format!("value of {key}"), self.ttl)
    }
}

//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las descripciones de las metricas de cache.
/// Llamar una vez al inicio, despues de instalar el recorder.
pub fn register_cache_metrics() {
    metrics::describe_counter!("front_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!("front_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!(
        "front_cache_fetches_total",
        "Total number of fetcher invocations"
    );
    metrics::describe_counter!(
        "front_cache_evictions_total",
        "Total number of cache evictions"
    );
    metrics::describe_gauge!("front_cache_entries", "Current number of entries in cache");
    metrics::describe_histogram!(
        "front_cache_fetch_seconds",
        "Time spent in the fetcher on cache misses"
    );
}

/// Motivo por el cual una entry salio de la tabla.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Expiro su TTL.
    Ttl,
    /// Removida explicitamente.
    Manual,
    /// Reemplazada por una insercion incondicional.
    Replaced,
    /// Su poblador abandono el fetch antes de guardar un valor.
    Abandoned,
    /// No pudo programarse su expiracion (scheduler detenido).
    Shutdown,
}

impl EvictionReason {
    /// Label usado en las metricas.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Ttl => "ttl",
            EvictionReason::Manual => "manual",
            EvictionReason::Replaced => "replaced",
            EvictionReason::Abandoned => "abandoned",
            EvictionReason::Shutdown => "shutdown",
        }
    }
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos para consultas locales y el crate `metrics`
/// para exportar.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    cache: Arc<str>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl CacheMetrics {
    /// Crea un recorder para el cache con el nombre dado.
    pub fn new(cache: &str) -> Self {
        Self {
            cache: Arc::from(cache),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            fetches: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("front_cache_hits_total", "cache" => self.cache.to_string()).increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("front_cache_misses_total", "cache" => self.cache.to_string()).increment(1);
    }

    /// Registra una llamada al fetcher y su duracion
    pub fn record_fetch(&self, duration: Duration) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        counter!("front_cache_fetches_total", "cache" => self.cache.to_string()).increment(1);
        histogram!("front_cache_fetch_seconds", "cache" => self.cache.to_string())
            .record(duration.as_secs_f64());
    }

    /// Registra una eviction
    pub fn record_eviction(&self, reason: EvictionReason) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        counter!(
            "front_cache_evictions_total",
            "cache" => self.cache.to_string(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: usize) {
        gauge!("front_cache_entries", "cache" => self.cache.to_string()).set(count as f64);
    }

    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let misses = self.misses() as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Retorna el numero de hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Retorna el numero de misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Retorna el numero de llamadas al fetcher
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Retorna el numero de evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_metrics_hit_rate() {
        let metrics = CacheMetrics::default();
        assert_eq!(metrics.hit_rate(), 0.0);

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let rate = metrics.hit_rate();
        assert!((rate - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_counters() {
        let metrics = CacheMetrics::new("pages");

        metrics.record_fetch(Duration::from_millis(3));
        metrics.record_fetch(Duration::from_millis(4));
        metrics.record_eviction(EvictionReason::Ttl);

        assert_eq!(metrics.fetches(), 2);
        assert_eq!(metrics.evictions(), 1);
        assert_eq!(metrics.hits(), 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = CacheMetrics::new("pages");
        let clone = metrics.clone();

        clone.record_miss();
        assert_eq!(metrics.misses(), 1);
    }

    #[test]
    fn test_eviction_reason_labels() {
        assert_eq!(EvictionReason::Ttl.as_str(), "ttl");
        assert_eq!(EvictionReason::Manual.as_str(), "manual");
        assert_eq!(EvictionReason::Replaced.as_str(), "replaced");
        assert_eq!(EvictionReason::Abandoned.as_str(), "abandoned");
        assert_eq!(EvictionReason::Shutdown.as_str(), "shutdown");
    }
}

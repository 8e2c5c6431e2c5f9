//! Cache concurrente con TTL y poblacion lazy.

use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::RwLockWriteGuard;
use tracing::{debug, warn};

use crate::config::{CacheConfig, InsertPolicy};
use crate::entry::Entry;
use crate::error::CacheError;
use crate::expiry::{ExpiryHandle, ExpiryScheduler};
use crate::fetch::{Fetched, Fetcher};
use crate::metrics::{CacheMetrics, EvictionReason};

/// Tabla de entries. El lock solo protege cambios estructurales
/// (insert/delete), nunca el valor de una entry, y jamas se mantiene
/// a traves de un `.await`.
pub(crate) struct Table {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    next_id: AtomicU64,
    metrics: CacheMetrics,
}

impl Table {
    pub(crate) fn new(metrics: CacheMetrics) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Crea una entry vacia, todavia no visible en la tabla.
    fn new_entry(&self) -> Arc<Entry> {
        Arc::new(Entry::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn lookup(&self, key: &str) -> Option<Arc<Entry>> {
        self.entries.read().get(key).cloned()
    }

    /// Publica `entry` bajo `key` segun la politica dada.
    ///
    /// Con `InsertIfAbsent` retorna `Err` con la entry existente si otro
    /// caller gano la carrera. Con `Overwrite` retorna la entry reemplazada.
    fn insert(
        &self,
        key: &str,
        entry: &Arc<Entry>,
        policy: InsertPolicy,
    ) -> Result<Option<Arc<Entry>>, Arc<Entry>> {
        let mut entries = self.entries.write();

        let replaced = match policy {
            InsertPolicy::InsertIfAbsent => match entries.entry(key.to_string()) {
                Slot::Occupied(existing) => return Err(Arc::clone(existing.get())),
                Slot::Vacant(vacant) => {
                    vacant.insert(Arc::clone(entry));
                    None
                },
            },
            InsertPolicy::Overwrite => entries.insert(key.to_string(), Arc::clone(entry)),
        };

        let count = entries.len();
        drop(entries);

        if replaced.is_some() {
            self.metrics.record_eviction(EvictionReason::Replaced);
        }
        self.metrics.update_entry_count(count);

        Ok(replaced)
    }

    /// Remueve la entry de `key`, sea cual sea.
    fn remove(&self, key: &str) -> Option<Arc<Entry>> {
        let mut entries = self.entries.write();
        let removed = entries.remove(key);
        let count = entries.len();
        drop(entries);

        if removed.is_some() {
            self.metrics.record_eviction(EvictionReason::Manual);
            self.metrics.update_entry_count(count);
        }
        removed
    }

    /// Remueve `key` solo si sigue apuntando a la entry `entry_id`.
    pub(crate) fn evict(&self, key: &str, entry_id: u64, reason: EvictionReason) -> bool {
        let mut entries = self.entries.write();
        if !entries.get(key).is_some_and(|entry| entry.id() == entry_id) {
            return false;
        }
        entries.remove(key);
        let count = entries.len();
        drop(entries);

        self.metrics.record_eviction(reason);
        self.metrics.update_entry_count(count);
        true
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Inserta una entry vacia y retorna su id (solo para tests).
    #[cfg(test)]
    pub(crate) fn insert_new(&self, key: &str) -> u64 {
        let entry = self.new_entry();
        let id = entry.id();
        self.entries.write().insert(key.to_string(), entry);
        id
    }
}

struct Inner {
    table: Arc<Table>,
    fetcher: Arc<dyn Fetcher>,
    config: CacheConfig,
    expiry: ExpiryHandle,
}

/// Cache en memoria de keys string a valores binarios.
///
/// Los valores se obtienen de forma lazy con un [`Fetcher`] y se remueven
/// cuando expira el TTL que el fetcher retorno, contado desde que el valor
/// fue guardado. Un hit no extiende el TTL.
///
/// Clonar un `Cache` es barato: todos los clones comparten la misma tabla.
/// Cuando se descarta el ultimo clon, el scheduler de expiracion se detiene.
///
/// # Examples
///
/// ```no_run
/// use front_cache::{Cache, Fetched};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache = Cache::new(|key: String| async move {
///     Fetched::new(format!("contents of {key}"), Duration::from_secs(3600))
/// });
///
/// let (value, hit) = cache.get("/index.html").await;
/// assert!(!hit);
///
/// let (cached, hit) = cache.get("/index.html").await;
/// assert!(hit);
/// assert_eq!(value, cached);
/// # }
/// ```
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    /// Crea un cache con la configuracion por defecto.
    ///
    /// # Panics
    ///
    /// Si se llama fuera de un runtime de Tokio.
    pub fn new(fetcher: impl Fetcher) -> Self {
        Self::build(Arc::new(fetcher), CacheConfig::default())
    }

    /// Crea un cache con la configuracion dada.
    ///
    /// Falla si la configuracion es invalida o si no hay un runtime de Tokio
    /// disponible para el scheduler de expiracion.
    pub fn with_config(fetcher: impl Fetcher, config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;
        Ok(Self::build(Arc::new(fetcher), config))
    }

    fn build(fetcher: Arc<dyn Fetcher>, config: CacheConfig) -> Self {
        let table = Arc::new(Table::new(CacheMetrics::new(config.name())));
        let expiry = ExpiryScheduler::new(Arc::downgrade(&table)).start();

        Self {
            inner: Arc::new(Inner {
                table,
                fetcher,
                config,
                expiry,
            }),
        }
    }

    /// Obtiene el valor de `key`, llamando al fetcher si no esta en cache.
    ///
    /// Retorna el valor y si fue un hit. "Hit" significa que se encontro una
    /// entry existente, incluso si otro caller todavia la estaba poblando y
    /// esta llamada tuvo que esperarlo.
    pub async fn get(&self, key: &str) -> (Bytes, bool) {
        loop {
            let entry = match self.table().lookup(key) {
                Some(entry) => entry,
                None => {
                    let entry = self.table().new_entry();
                    // Tomado antes de publicar: nadie ve la entry sin valor.
                    let slot = entry.write().await;

                    match self.table().insert(key, &entry, self.config().insert_policy()) {
                        Ok(replaced) => {
                            if let Some(replaced) = replaced {
                                self.inner.expiry.cancel(replaced.id());
                            }
                            return self.populate(key, &entry, slot).await;
                        },
                        Err(existing) => existing,
                    }
                },
            };

            let value = entry.read().await.clone();
            if let Some(value) = value {
                self.metrics().record_hit();
                debug!(cache = %self.config().name(), key = %key, "Cache hit");
                return (value, true);
            }

            // El poblador se descarto (future cancelado o panic en el fetcher)
            // antes de guardar un valor.
            warn!(
                cache = %self.config().name(),
                key = %key,
                "Entry abandoned before population, retrying"
            );
            self.table().evict(key, entry.id(), EvictionReason::Abandoned);
        }
    }

    /// Llama al fetcher y guarda el valor en la entry recien publicada.
    async fn populate(
        &self,
        key: &str,
        entry: &Entry,
        mut slot: RwLockWriteGuard<'_, Option<Bytes>>,
    ) -> (Bytes, bool) {
        self.metrics().record_miss();
        debug!(cache = %self.config().name(), key = %key, "Cache miss, fetching");

        let start = Instant::now();
        let Fetched { value, ttl } = self.inner.fetcher.fetch(key).await;
        self.metrics().record_fetch(start.elapsed());

        *slot = Some(value.clone());
        drop(slot);

        if let Err(e) = self.inner.expiry.schedule(key, entry.id(), ttl) {
            // Sin expiracion la entry viviria para siempre.
            warn!(
                cache = %self.config().name(),
                key = %key,
                error = %e,
                "Could not schedule expiry, dropping entry"
            );
            self.table().evict(key, entry.id(), EvictionReason::Shutdown);
        } else {
            debug!(
                cache = %self.config().name(),
                key = %key,
                ttl = ?ttl,
                bytes = value.len(),
                "Entry populated"
            );
        }

        (value, false)
    }

    /// Remueve `key` del cache. No hace nada si no existe.
    pub fn remove(&self, key: &str) {
        if let Some(entry) = self.table().remove(key) {
            self.inner.expiry.cancel(entry.id());
            debug!(cache = %self.config().name(), key = %key, "Cache entry removed");
        }
    }

    /// Detiene el scheduler de expiracion y descarta los timers pendientes.
    ///
    /// El cache sigue respondiendo, pero los valores obtenidos a partir de
    /// ahora no se retienen.
    pub fn shutdown(&self) {
        self.inner.expiry.stop();
        debug!(cache = %self.config().name(), "Cache shut down");
    }

    /// Retorna true si el scheduler de expiracion ya no corre.
    pub fn is_shut_down(&self) -> bool {
        self.inner.expiry.is_stopped()
    }

    /// Retorna true si existe una entry para `key` (poblada o no).
    pub fn contains(&self, key: &str) -> bool {
        self.table().contains(key)
    }

    /// Retorna el numero de entries en la tabla.
    pub fn entry_count(&self) -> usize {
        self.table().len()
    }

    /// Retorna la configuracion del cache.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.table().metrics
    }

    fn table(&self) -> &Table {
        &self.inner.table
    }
}

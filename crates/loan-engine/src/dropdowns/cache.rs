use super::domain::{CacheEntry, CacheKey, DropdownDataset};
use super::{CacheError, DropdownSource, SourceError};
use crate::config::EngineConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type Shared = Option<Result<Arc<DropdownDataset>, CacheError>>;
type Entries = HashMap<CacheKey, CacheEntry<Arc<DropdownDataset>>>;

/// Screens the source does not know are cached so repeated misses stay
/// cheap, but only up to this many at once.
pub const MAX_DEGRADED_ENTRIES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub upstream_fetches: u64,
    pub cached_keys: usize,
    pub inflight: usize,
}

/// TTL cache over a [`DropdownSource`].
///
/// At most one upstream fetch runs per key. The fetch runs on its own task,
/// so a caller that gives up does not cancel it for the others.
pub struct DropdownCache<S> {
    inner: Arc<CacheInner<S>>,
}

impl<S> Clone for DropdownCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<S> {
    source: S,
    ttl: Duration,
    retry_backoff: Duration,
    entries: RwLock<Arc<Entries>>,
    inflight: Mutex<HashMap<CacheKey, Inflight>>,
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_fetches: AtomicU64,
}

impl<S: DropdownSource> DropdownCache<S> {
    pub fn new(source: S, ttl: Duration, retry_backoff: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                ttl,
                retry_backoff,
                entries: RwLock::new(Arc::new(HashMap::new())),
                inflight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                upstream_fetches: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(source: S, config: &EngineConfig) -> Self {
        Self::new(source, config.dropdown_cache_ttl, config.dropdown_retry_backoff)
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub async fn get_bulk(
        &self,
        screen_location: &str,
        language_code: &str,
    ) -> Result<Arc<DropdownDataset>, CacheError> {
        let key = CacheKey::new(screen_location, language_code);
        if let Some(hit) = self.inner.fresh(&key) {
            return Ok(hit);
        }

        let mut receiver = {
            let mut inflight = lock(&self.inner.inflight);
            // A fetch may have landed between the first check and the lock.
            if let Some(hit) = self.inner.fresh(&key) {
                return Ok(hit);
            }
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            match inflight.get(&key) {
                Some(pending) => {
                    debug!(screen = %key.screen_location, language = %key.language_code, "joining in-flight dropdown fetch");
                    pending.receiver.clone()
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    let stale = Arc::new(AtomicBool::new(false));
                    inflight.insert(
                        key.clone(),
                        Inflight {
                            receiver: receiver.clone(),
                            stale: Arc::clone(&stale),
                        },
                    );
                    self.spawn_fetch(key.clone(), stale, sender);
                    receiver
                }
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(shared) => shared.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| Err(CacheError::upstream(&key, "fetch ended without a result")))
    }

    /// Like [`Self::get_bulk`], but only this caller gives up after `limit`.
    pub async fn get_bulk_with_timeout(
        &self,
        screen_location: &str,
        language_code: &str,
        limit: Duration,
    ) -> Result<Arc<DropdownDataset>, CacheError> {
        match tokio::time::timeout(limit, self.get_bulk(screen_location, language_code)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    screen = %screen_location,
                    language = %language_code,
                    waited_ms = limit.as_millis() as u64,
                    "caller stopped waiting for dropdown fetch"
                );
                Err(CacheError::Timeout {
                    screen_location: screen_location.to_string(),
                    language_code: language_code.to_string(),
                    waited_ms: limit.as_millis() as u64,
                })
            }
        }
    }

    /// Drop entries matching both filters; `None` matches everything on that
    /// dimension. Matching fetches already in flight will not be stored;
    /// fetches for other keys are unaffected.
    pub fn invalidate(&self, screen_location: Option<&str>, language_code: Option<&str>) -> usize {
        // Inflight before entries: the same order `get_bulk` takes them in.
        for (key, pending) in lock(&self.inner.inflight).iter() {
            if key.matches(screen_location, language_code) {
                pending.stale.store(true, Ordering::SeqCst);
            }
        }

        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = Entries::clone(&entries);
        next.retain(|key, _| !key.matches(screen_location, language_code));
        let removed = entries.len() - next.len();
        let now = Instant::now();
        next.retain(|_, entry| entry.is_fresh(now));
        *entries = Arc::new(next);
        drop(entries);

        info!(
            screen = screen_location.unwrap_or("*"),
            language = language_code.unwrap_or("*"),
            removed,
            "dropdown cache invalidated"
        );
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            upstream_fetches: self.inner.upstream_fetches.load(Ordering::Relaxed),
            cached_keys: entries,
            inflight: lock(&self.inner.inflight).len(),
        }
    }

    fn spawn_fetch(&self, key: CacheKey, stale: Arc<AtomicBool>, sender: watch::Sender<Shared>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = InflightGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
            };
            let outcome = inner.fetch_with_retry(&key).await.map(|dataset| {
                let dataset = Arc::new(dataset);
                inner.store(&key, Arc::clone(&dataset), &stale);
                dataset
            });
            drop(guard);
            sender.send_replace(Some(outcome));
        });
    }
}

impl<S: DropdownSource> CacheInner<S> {
    fn fresh(&self, key: &CacheKey) -> Option<Arc<DropdownDataset>> {
        let entries = Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner));
        let entry = entries.get(key).filter(|entry| entry.is_fresh(Instant::now()))?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(screen = %key.screen_location, language = %key.language_code, "dropdown cache hit");
        Some(Arc::clone(&entry.value))
    }

    async fn fetch_with_retry(&self, key: &CacheKey) -> Result<DropdownDataset, CacheError> {
        match self.fetch_once(key).await {
            Ok(dataset) => Ok(dataset),
            Err(first) => {
                warn!(
                    screen = %key.screen_location,
                    language = %key.language_code,
                    error = %first,
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "dropdown fetch failed, retrying once"
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.fetch_once(key).await.map_err(|err| {
                    error!(
                        screen = %key.screen_location,
                        language = %key.language_code,
                        error = %err,
                        "dropdown fetch failed after retry"
                    );
                    CacheError::upstream(key, err.to_string())
                })
            }
        }
    }

    async fn fetch_once(&self, key: &CacheKey) -> Result<DropdownDataset, SourceError> {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        info!(screen = %key.screen_location, language = %key.language_code, "fetching dropdowns upstream");
        self.source
            .fetch_bulk(&key.screen_location, &key.language_code)
            .await
    }

    /// Copy-on-write insert. Expired entries are dropped from every rebuilt
    /// map, so keys nobody asks for again do not accumulate.
    fn store(&self, key: &CacheKey, dataset: Arc<DropdownDataset>, stale: &AtomicBool) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if stale.load(Ordering::SeqCst) {
            debug!(screen = %key.screen_location, language = %key.language_code, "discarding fetch that raced an invalidation");
            return;
        }

        let now = Instant::now();
        let mut next = Entries::clone(&entries);
        next.retain(|_, entry| entry.is_fresh(now));

        if dataset.is_degraded() {
            let degraded = next
                .iter()
                .filter(|(cached, entry)| *cached != key && entry.value.is_degraded())
                .count();
            if degraded >= MAX_DEGRADED_ENTRIES {
                debug!(screen = %key.screen_location, language = %key.language_code, degraded, "degraded entry limit reached, not caching");
                *entries = Arc::new(next);
                return;
            }
            warn!(screen = %key.screen_location, language = %key.language_code, "screen has no dropdowns, caching degraded dataset");
        }

        next.insert(key.clone(), CacheEntry::new(dataset, self.ttl));
        *entries = Arc::new(next);
    }
}

struct Inflight {
    receiver: watch::Receiver<Shared>,
    /// Set by `invalidate`; the fetch still answers its waiters but is not cached.
    stale: Arc<AtomicBool>,
}

struct InflightGuard<S> {
    inner: Arc<CacheInner<S>>,
    key: CacheKey,
}

impl<S> Drop for InflightGuard<S> {
    fn drop(&mut self) {
        lock(&self.inner.inflight).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Resource cache core - strategies, deduplication and revalidation

use crate::cache::{CacheEntry, CacheStats};
use crate::config::CacheConfig;
use crate::error::LoadError;
use crate::fetch::Fetch;
use crate::plan::{CacheStrategy, LoadPlan, ResourceSpec};
use crate::request::{CacheKey, Request};
use crate::BoxFuture;
use chrono::Utc;
use futures::future::{try_join_all, FutureExt, Shared};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use url::Url;

/// Fresher data found by a background refresh
#[derive(Debug, Clone, PartialEq)]
pub struct Revalidation {
    pub key: CacheKey,
    pub value: Value,
}

/// Callback invoked when a background refresh produced changed data
pub type RevalidateSink = Arc<dyn Fn(Revalidation) + Send + Sync>;

#[derive(Debug, Clone)]
struct Fetched {
    value: Value,
    /// False when the fetch matched the entry already cached
    changed: bool,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Fetched, LoadError>>>;

/// Outstanding fetch for a key
struct InFlight {
    id: u64,
    fetch: SharedFetch,
    /// Driven by a spawned revalidation, which always runs to completion
    background: bool,
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Strategy-aware cache keyed by canonical request identity
///
/// Cheap to clone; clones share the same entries, stats and background tasks.
pub struct ResourceCache {
    config: CacheConfig,
    base: Option<Url>,
    fetcher: Arc<dyn Fetch>,
    slots: Arc<Mutex<HashMap<CacheKey, Slot>>>,
    stats: Arc<Mutex<CacheStats>>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
    fetch_ids: Arc<AtomicU64>,
}

impl ResourceCache {
    /// Create a new resource cache
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetch>) -> Result<Self, LoadError> {
        let base = config
            .base_url
            .as_deref()
            .map(|base| {
                Url::parse(base).map_err(|e| LoadError::InvalidUrl {
                    url: base.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        tracing::debug!(
            "Resource cache ready (transport: {}, strategy: {:?}, ttl: {:?})",
            fetcher.name(),
            config.default_strategy,
            config.default_ttl
        );

        Ok(Self {
            config,
            base,
            fetcher,
            slots: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(CacheStats::default())),
            background: Arc::new(Mutex::new(Vec::new())),
            fetch_ids: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Canonical key for a resource
    pub fn key_for(&self, spec: &ResourceSpec) -> Result<CacheKey, LoadError> {
        spec.request.canonical_key(self.base.as_ref())
    }

    /// Resolve a single resource according to its strategy
    ///
    /// `notify` is invoked if a stale-while-revalidate background refresh
    /// later finds changed data for this resource.
    pub async fn load(
        &self,
        spec: &ResourceSpec,
        notify: Option<RevalidateSink>,
    ) -> Result<Value, LoadError> {
        let strategy = spec.cache.strategy.unwrap_or(self.config.default_strategy);
        let ttl = spec.cache.ttl.unwrap_or(self.config.default_ttl);

        match strategy {
            CacheStrategy::NoStore => {
                tracing::debug!("no-store fetch: {}", spec.request.url);
                lock(&self.stats).fetches += 1;
                Self::perform(self.fetcher.as_ref(), self.base.as_ref(), spec)
                    .await
                    .map(|(value, _)| value)
            }
            CacheStrategy::NetworkFirst => {
                let key = self.key_for(spec)?;
                match self.fetch_shared(&key, spec, false).await {
                    Ok(fetched) => Ok(fetched.value),
                    Err(err) => match self.cached(&key, spec) {
                        Some(entry) => {
                            tracing::warn!(
                                "Fetch for {} failed, serving cached value: {}",
                                key,
                                err
                            );
                            self.record_hit();
                            Ok(entry.value)
                        }
                        None => Err(err),
                    },
                }
            }
            CacheStrategy::CacheFirst => {
                let key = self.key_for(spec)?;
                if let Some(entry) = self.cached(&key, spec).filter(|e| e.is_fresh(ttl)) {
                    tracing::trace!("cache-first hit: {}", key);
                    self.record_hit();
                    return Ok(entry.value);
                }
                self.record_miss();
                self.fetch_shared(&key, spec, false).await.map(|f| f.value)
            }
            CacheStrategy::StaleWhileRevalidate => {
                let key = self.key_for(spec)?;
                if let Some(entry) = self.cached(&key, spec) {
                    self.record_hit();
                    if entry.is_stale(spec.cache.soft_ttl.unwrap_or(ttl)) {
                        self.spawn_revalidation(key, spec.clone(), notify);
                    }
                    return Ok(entry.value);
                }
                self.record_miss();
                self.fetch_shared(&key, spec, false).await.map(|f| f.value)
            }
        }
    }

    /// Resolve every resource of a plan concurrently
    ///
    /// Produces a JSON object keyed by the plan's names. The first failing
    /// resource fails the whole plan.
    pub async fn load_plan(
        &self,
        plan: &LoadPlan,
        notify: Option<RevalidateSink>,
    ) -> Result<Value, LoadError> {
        let loads = plan.iter().map(|(name, spec)| {
            let notify = notify.clone();
            async move {
                self.load(spec, notify)
                    .await
                    .map(|value| (name.to_string(), value))
            }
        });

        let resolved = try_join_all(loads).await?;
        Ok(Value::Object(resolved.into_iter().collect::<Map<String, Value>>()))
    }

    /// Get a cached entry by key
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        lock(&self.slots)
            .get(key)
            .and_then(|slot| slot.entry.clone())
    }

    /// Remove entries by canonical key, request URL or tag
    ///
    /// Each target is compared against canonical keys and entry tags; targets
    /// that look like URLs (`/path` or `scheme://`) are also canonicalized as
    /// GET requests. Outstanding fetches for removed keys no longer populate
    /// the cache, so the next resolution of a removed key fetches again.
    /// Returns the number of removed keys.
    pub fn invalidate<I, S>(&self, keys_or_tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: Vec<String> = keys_or_tags
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        let canonical: Vec<CacheKey> = targets
            .iter()
            .filter(|t| t.starts_with('/') || t.contains("://"))
            .filter_map(|t| Request::get(t.as_str()).canonical_key(self.base.as_ref()).ok())
            .collect();

        let removed = {
            let mut slots = lock(&self.slots);
            let before = slots.len();
            slots.retain(|key, slot| {
                let by_key = targets.iter().any(|t| t == key.as_str()) || canonical.contains(key);
                let by_tag = slot
                    .entry
                    .as_ref()
                    .map_or(false, |e| e.tags.iter().any(|tag| targets.contains(tag)));
                !(by_key || by_tag)
            });
            before - slots.len()
        };

        lock(&self.stats).invalidations += removed as u64;
        tracing::debug!("Invalidated {} cache key(s) for {:?}", removed, targets);
        removed
    }

    /// Clear all cached entries and reset stats
    pub fn clear(&self) {
        lock(&self.slots).clear();
        *lock(&self.stats) = CacheStats::default();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        lock(&self.stats).clone()
    }

    /// Get all keys holding a value
    pub fn keys(&self) -> Vec<CacheKey> {
        lock(&self.slots)
            .iter()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Wait until every background revalidation started so far has finished
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.background));
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::warn!("Background revalidation task failed: {}", e);
                }
            }
        }
    }

    fn cached(&self, key: &CacheKey, spec: &ResourceSpec) -> Option<CacheEntry> {
        lock(&self.slots)
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.serves_version(spec.cache.version.as_deref()))
            .cloned()
    }

    /// Fetch `key`, joining an outstanding fetch for the same key if any
    async fn fetch_shared(
        &self,
        key: &CacheKey,
        spec: &ResourceSpec,
        background: bool,
    ) -> Result<Fetched, LoadError> {
        let shared = {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(key.clone()).or_default();
            match &slot.in_flight {
                Some(in_flight) => {
                    tracing::debug!("Joining in-flight fetch: {}", key);
                    in_flight.fetch.clone()
                }
                None => {
                    let id = self.fetch_ids.fetch_add(1, Ordering::Relaxed);
                    let fut: BoxFuture<'static, Result<Fetched, LoadError>> = Box::pin(
                        Self::fetch_and_store(self.clone(), id, key.clone(), spec.clone()),
                    );
                    let fut = fut.shared();
                    slot.in_flight = Some(InFlight {
                        id,
                        fetch: fut.clone(),
                        background,
                    });
                    lock(&self.stats).fetches += 1;
                    tracing::debug!("Fetching: {}", key);
                    fut
                }
            }
        };
        shared.await
    }

    /// Body of a shared fetch: perform it, then write the result if this
    /// fetch still owns the key's slot
    async fn fetch_and_store(
        cache: ResourceCache,
        id: u64,
        key: CacheKey,
        spec: ResourceSpec,
    ) -> Result<Fetched, LoadError> {
        let result = Self::perform(cache.fetcher.as_ref(), cache.base.as_ref(), &spec).await;

        let mut slots = lock(&cache.slots);
        let owns_slot = slots
            .get(&key)
            .map_or(false, |slot| slot.in_flight.as_ref().map_or(false, |f| f.id == id));
        if !owns_slot {
            // invalidated while in flight
            return result.map(|(value, _)| Fetched { value, changed: true });
        }

        let (value, token) = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                let keep = slots.get_mut(&key).map_or(false, |slot| {
                    slot.in_flight = None;
                    slot.entry.is_some()
                });
                if !keep {
                    slots.remove(&key);
                }
                return Err(err);
            }
        };

        let slot = slots.entry(key).or_default();
        slot.in_flight = None;
        match slot.entry.as_mut() {
            Some(entry)
                if entry.serves_version(spec.cache.version.as_deref())
                    && entry.is_unchanged(&value, token.as_deref()) =>
            {
                entry.fetched_at = Utc::now();
                Ok(Fetched {
                    value: entry.value.clone(),
                    changed: false,
                })
            }
            _ => {
                let mut entry = CacheEntry::new(value.clone(), token);
                entry.tags = spec.cache.tags.clone();
                entry.version = spec.cache.version.clone();
                slot.entry = Some(entry);
                Ok(Fetched {
                    value,
                    changed: true,
                })
            }
        }
    }

    /// Run the transport and parse the body
    async fn perform(
        fetcher: &dyn Fetch,
        base: Option<&Url>,
        spec: &ResourceSpec,
    ) -> Result<(Value, Option<String>), LoadError> {
        let mut request = spec.request.clone();
        let url = request.resolve(base)?.to_string();
        request.url = url.clone();

        let response = fetcher.fetch(request).await?;
        if !response.is_success() {
            return Err(LoadError::Status {
                url,
                status: response.status,
            });
        }

        let value = spec.parser.parse(&url, &response)?;
        Ok((value, response.change_token()))
    }

    fn spawn_revalidation(
        &self,
        key: CacheKey,
        spec: ResourceSpec,
        notify: Option<RevalidateSink>,
    ) {
        // foreground fetches lose their only driver when the awaiting task is
        // aborted; join those
        {
            let mut slots = lock(&self.slots);
            if let Some(in_flight) = slots.get_mut(&key).and_then(|slot| slot.in_flight.as_mut()) {
                if in_flight.background {
                    tracing::trace!("Revalidation already in flight: {}", key);
                    return;
                }
                in_flight.background = true;
                tracing::trace!("Revalidation joins in-flight fetch: {}", key);
            }
        }

        let cache = self.clone();
        let handle = tokio::spawn(async move { cache.revalidate(key, spec, notify).await });

        let mut background = lock(&self.background);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    async fn revalidate(&self, key: CacheKey, spec: ResourceSpec, notify: Option<RevalidateSink>) {
        tracing::debug!("Revalidating stale entry: {}", key);
        match self.fetch_shared(&key, &spec, true).await {
            Ok(Fetched { changed: false, .. }) => {
                tracing::trace!("Revalidation unchanged: {}", key);
            }
            Ok(Fetched { value, .. }) => {
                lock(&self.stats).revalidations += 1;
                tracing::debug!("Revalidation produced fresher data: {}", key);
                if let Some(notify) = notify {
                    notify(Revalidation { key, value });
                }
            }
            Err(err) => {
                tracing::warn!("Revalidation of {} failed, keeping cached value: {}", key, err);
            }
        }
    }

    fn record_hit(&self) {
        lock(&self.stats).hits += 1;
    }

    fn record_miss(&self) {
        lock(&self.stats).misses += 1;
    }
}

impl Clone for ResourceCache {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            base: self.base.clone(),
            fetcher: Arc::clone(&self.fetcher),
            slots: Arc::clone(&self.slots),
            stats: Arc::clone(&self.stats),
            background: Arc::clone(&self.background),
            fetch_ids: Arc::clone(&self.fetch_ids),
        }
    }
}

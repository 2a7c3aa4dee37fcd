//! Query cache service
//!
//! An explicitly constructed, injected cache for dashboard views. It replaces
//! the ambient in-memory store of a client-side query library:
//!
//! - **Entries**: type-erased snapshots keyed by [`QueryKey`], with the time of
//!   the last successful fetch, the last error and an observer count
//! - **Coalescing**: concurrent fetches for one key share a single underlying
//!   call; the leader broadcasts its result to every waiter
//! - **Invalidation**: prefix-matched entries are marked stale and an event is
//!   published so mounted observers refetch. Fetches already running for those
//!   keys are detached; their results reach their own waiters but are never
//!   stored as fresh
//! - **Garbage collection**: entries nobody observes are dropped after `gc_time`
//!
//! All synchronous operations are O(1) or a single pass over the entry map.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::keys::QueryKey;

// ============================================================================
// Errors
// ============================================================================

/// A fetch function rejected or the action reported `ok: false`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// How long an unobserved entry survives (default: 5 minutes)
    pub gc_time: Duration,
    /// Upper bound on stored entries (default: 1000)
    pub max_entries: usize,
    /// Capacity of the invalidation/update event channel
    pub event_capacity: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            gc_time: Duration::from_secs(5 * 60),
            max_entries: 1000,
            event_capacity: 256,
        }
    }
}

// ============================================================================
// Entries and events
// ============================================================================

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedResult = Result<AnyValue, FetchError>;

struct CacheEntry {
    data: Option<AnyValue>,
    error: Option<FetchError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Bumped by every invalidation; a fetch stores only if it is unchanged
    generation: u64,
    observers: usize,
    touched_at: Instant,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            observers: 0,
            touched_at: Instant::now(),
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        if self.invalidated {
            return true;
        }
        match (self.data.as_ref(), self.updated_at) {
            (Some(_), Some(at)) => at.elapsed() >= stale_time,
            _ => true,
        }
    }
}

/// Published on every invalidation and every stored fetch result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Everything under this prefix is stale
    Invalidated(QueryKey),
    /// A new result (data or error) was stored for this exact key
    Updated(QueryKey),
}

/// Point-in-time view of one entry
#[derive(Debug, Clone)]
pub struct QueryState {
    pub has_data: bool,
    pub error: Option<FetchError>,
    pub invalidated: bool,
    pub observers: usize,
    pub updated_at: Option<Instant>,
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

// ============================================================================
// In-flight tracking
// ============================================================================

/// A running fetch: its id and the channel its waiters listen on
struct InFlight {
    id: u64,
    sender: broadcast::Sender<SharedResult>,
}

/// Removes the in-flight marker if the leading fetch is dropped before it
/// finishes, so waiters see a closed channel instead of hanging.
///
/// Only the marker this fetch inserted is removed. After an invalidation
/// detaches it, the key may already belong to a newer fetch.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<QueryKey, InFlight>,
    key: &'a QueryKey,
    id: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn release(&self) {
        self.in_flight.remove_if(self.key, |_, running| running.id == self.id);
    }

    fn finish(mut self) {
        self.release();
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.release();
        }
    }
}

// ============================================================================
// Query Cache
// ============================================================================

pub struct QueryCache {
    entries: DashMap<QueryKey, CacheEntry>,
    in_flight: DashMap<QueryKey, InFlight>,
    events: broadcast::Sender<CacheEvent>,
    next_fetch_id: AtomicU64,

    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,

    config: QueryCacheConfig,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        info!(
            gc_secs = config.gc_time.as_secs(),
            max_entries = config.max_entries,
            "QueryCache initialized"
        );

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            events,
            next_fetch_id: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(QueryCacheConfig::default())
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    /// Receive invalidation and update events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Serve fresh cached data, otherwise fetch (coalesced with any fetch
    /// already running for the key).
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<Arc<T>, FetchError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(data) = self.fresh_data::<T>(key, stale_time) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Query cache hit");
            return Ok(data);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Query cache miss");
        self.fetch_fresh(key, fetcher).await
    }

    /// Fetch regardless of staleness. Joins an in-flight fetch for the same
    /// key instead of starting a second one.
    pub async fn fetch_fresh<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, FetchError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // Read before registering: an invalidation in between makes the result
        // discarded rather than stored as fresh
        let generation = self
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty)
            .generation;
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);

        let sender = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let mut receiver = existing.get().sender.subscribe();
                drop(existing);
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Joining in-flight fetch");

                return match receiver.recv().await {
                    Ok(result) => downcast_result(key, result),
                    Err(_) => Err(FetchError::new(format!("Fetch for {} was cancelled", key))),
                };
            }
            Entry::Vacant(slot) => {
                let (sender, _) = broadcast::channel(1);
                slot.insert(InFlight {
                    id,
                    sender: sender.clone(),
                });
                sender
            }
        };

        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            key,
            id,
            armed: true,
        };

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result: SharedResult = fetcher().await.map(|value| Arc::new(value) as AnyValue);

        match &result {
            Ok(_) => debug!(
                key = %key,
                duration_ms = started.elapsed().as_millis() as u64,
                "Query fetched"
            ),
            Err(e) => warn!(key = %key, error = %e, "Query fetch failed"),
        }

        self.store_result(key, &result, Some(generation));
        guard.finish();

        // Receivers may have dropped
        let _ = sender.send(result.clone());

        downcast_result(key, result)
    }

    /// Cached data if present and younger than `stale_time`
    pub fn fresh_data<T: Send + Sync + 'static>(&self, key: &QueryKey, stale_time: Duration) -> Option<Arc<T>> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.is_stale(stale_time) {
            return None;
        }
        entry.touched_at = Instant::now();
        entry.data.clone().and_then(|value| value.downcast::<T>().ok())
    }

    /// Cached data regardless of staleness
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let mut entry = self.entries.get_mut(key)?;
        entry.touched_at = Instant::now();
        entry.data.clone().and_then(|value| value.downcast::<T>().ok())
    }

    /// Last error stored for the key, if the most recent fetch failed
    pub fn get_query_error(&self, key: &QueryKey) -> Option<FetchError> {
        self.entries.get(key).and_then(|entry| entry.error.clone())
    }

    pub fn is_stale(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.is_stale(stale_time))
            .unwrap_or(true)
    }

    pub fn query_state(&self, key: &QueryKey) -> Option<QueryState> {
        self.entries.get(key).map(|entry| QueryState {
            has_data: entry.data.is_some(),
            error: entry.error.clone(),
            invalidated: entry.invalidated,
            observers: entry.observers,
            updated_at: entry.updated_at,
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Seed data without fetching (server-supplied initial data)
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T) {
        let result: SharedResult = Ok(Arc::new(data));
        self.store_result(key, &result, None);
    }

    /// Store a result. With `fetched_at_generation`, a result whose entry was
    /// invalidated after the fetch began is dropped and the entry stays stale.
    fn store_result(&self, key: &QueryKey, result: &SharedResult, fetched_at_generation: Option<u64>) {
        {
            let mut entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(CacheEntry::empty);
            if fetched_at_generation.is_some_and(|generation| generation != entry.generation) {
                debug!(key = %key, "Discarding result fetched before invalidation");
                return;
            }
            let now = Instant::now();
            match result {
                Ok(value) => {
                    entry.data = Some(Arc::clone(value));
                    entry.error = None;
                    entry.updated_at = Some(now);
                    entry.invalidated = false;
                }
                Err(e) => {
                    // Keep the previous snapshot; the error is reported beside it
                    entry.error = Some(e.clone());
                }
            }
            entry.touched_at = now;
        }

        // No subscribers is fine
        let _ = self.events.send(CacheEvent::Updated(key.clone()));
    }

    /// Mark every entry under `prefix` stale and notify observers.
    ///
    /// Returns the number of entries marked. Does not wait for refetches.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut marked = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.invalidated = true;
                entry.generation += 1;
                marked += 1;
            }
        }

        // Later reads start their own fetch instead of joining one begun
        // before the mutation
        let running = self.in_flight.len();
        self.in_flight.retain(|key, _| !key.starts_with(prefix));
        let detached = running.saturating_sub(self.in_flight.len());

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        info!(prefix = %prefix, marked = marked, detached = detached, "Invalidated queries");

        let _ = self.events.send(CacheEvent::Invalidated(prefix.clone()));
        marked
    }

    /// Drop an entry outright
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn add_observer(&self, key: &QueryKey) {
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty);
        entry.observers += 1;
        entry.touched_at = Instant::now();
    }

    pub fn remove_observer(&self, key: &QueryKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            entry.touched_at = Instant::now();
        }
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.entries.get(key).map(|e| e.observers).unwrap_or(0)
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Evict unobserved entries past `gc_time`, then trim to `max_entries`
    /// oldest-first among unobserved entries.
    pub fn cleanup(&self) -> usize {
        let gc_time = self.config.gc_time;
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| entry.observers > 0 || entry.touched_at.elapsed() < gc_time);

        let mut evicted = before.saturating_sub(self.entries.len());

        let overflow = self.entries.len().saturating_sub(self.config.max_entries);
        if overflow > 0 {
            let mut candidates: Vec<(QueryKey, Instant)> = self
                .entries
                .iter()
                .filter(|e| e.observers == 0)
                .map(|e| (e.key().clone(), e.touched_at))
                .collect();
            candidates.sort_by_key(|(_, touched)| *touched);

            for (key, _) in candidates.into_iter().take(overflow) {
                if self.entries.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            info!(evicted = evicted, remaining = self.entries.len(), "Query cache cleanup");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            in_flight: self.in_flight.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn downcast_result<T: Send + Sync + 'static>(key: &QueryKey, result: SharedResult) -> Result<Arc<T>, FetchError> {
    result?
        .downcast::<T>()
        .map_err(|_| FetchError::new(format!("Cached value for {} has an unexpected type", key)))
}

/// Spawn a background task that periodically runs [`QueryCache::cleanup`]
pub fn spawn_cleanup_task(cache: Arc<QueryCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            cache.cleanup();
        }
    })
}

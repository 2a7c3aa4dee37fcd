//! Mounted query observers
//!
//! A [`QueryObserver`] is the hook behind one dashboard view. It binds a
//! [`QuerySpec`] to the shared [`QueryCache`], publishes snapshots over a
//! `watch` channel, and refetches on mount, on interval ticks, on explicit
//! request and whenever a matching prefix is invalidated.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::cache::{CacheEvent, FetchError, QueryCache};
use super::keys::QueryKey;
use super::policy::{QueryPolicy, RefetchOnMount};

/// Shared fetch function for a view
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Key, fetch function and freshness policy for one view
pub struct QuerySpec<T> {
    pub key: QueryKey,
    pub fetcher: Fetcher<T>,
    pub policy: QueryPolicy,
    /// Server-supplied data used to hydrate the cache on mount
    pub initial_data: Option<T>,
}

impl<T: Send + Sync + 'static> QuerySpec<T> {
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(move || -> BoxFuture<'static, Result<T, FetchError>> { Box::pin(fetch()) }),
            policy: QueryPolicy::default(),
            initial_data: None,
        }
    }

    pub fn with_policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// One-shot read through the cache, honoring `stale_time`.
    ///
    /// Disabled specs never call the fetch function.
    pub async fn fetch_through(&self, cache: &QueryCache) -> Result<Arc<T>, FetchError> {
        if !self.policy.enabled {
            return Err(FetchError::new(format!("Query {} is disabled", self.key)));
        }
        let fetcher = Arc::clone(&self.fetcher);
        cache
            .fetch(&self.key, self.policy.stale_time, move || fetcher())
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Disabled, or nothing fetched yet
    Idle,
    /// First fetch in progress, no data
    Loading,
    Success,
    Error,
}

/// Snapshot of a view as seen by one observer
#[derive(Debug)]
pub struct QueryResult<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<FetchError>,
    pub status: QueryStatus,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            status: self.status,
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

enum Command<T> {
    Refetch,
    SetSpec(QuerySpec<T>),
}

/// Live subscription to one cached view. Dropping it unmounts the view.
pub struct QueryObserver<T> {
    cache: Arc<QueryCache>,
    key: QueryKey,
    state: watch::Receiver<QueryResult<T>>,
    commands: mpsc::UnboundedSender<Command<T>>,
    task: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    /// Mount a view. Must be called inside a tokio runtime; the first fetch
    /// (if any) runs on the spawned task, never inline.
    pub fn mount(cache: Arc<QueryCache>, mut spec: QuerySpec<T>) -> Self {
        hydrate(&cache, &mut spec);
        cache.add_observer(&spec.key);

        let fetch_now = needs_mount_fetch(&cache, &spec);
        let (state_tx, state) = watch::channel(snapshot(&cache, &spec, fetch_now));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let events = cache.subscribe();
        let key = spec.key.clone();

        debug!(key = %key, fetch_now = fetch_now, "Query observer mounted");

        let task = tokio::spawn(drive(
            Arc::clone(&cache),
            spec,
            fetch_now,
            state_tx,
            command_rx,
            events,
        ));

        Self {
            cache,
            key,
            state,
            commands,
            task,
        }
    }

    /// Current snapshot
    pub fn current(&self) -> QueryResult<T> {
        self.state.borrow().clone()
    }

    /// Read-only subscription to snapshot changes
    pub fn watch(&self) -> watch::Receiver<QueryResult<T>> {
        self.state.clone()
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Request a refetch. Returns immediately.
    pub fn refetch(&self) {
        let _ = self.commands.send(Command::Refetch);
    }

    /// Switch to a different key or policy (e.g. a new filter value)
    pub fn set_spec(&mut self, mut spec: QuerySpec<T>) {
        hydrate(&self.cache, &mut spec);
        if spec.key != self.key {
            self.cache.remove_observer(&self.key);
            self.cache.add_observer(&spec.key);
            self.key = spec.key.clone();
        }
        let _ = self.commands.send(Command::SetSpec(spec));
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.task.abort();
        self.cache.remove_observer(&self.key);
    }
}

fn hydrate<T: Send + Sync + 'static>(cache: &QueryCache, spec: &mut QuerySpec<T>) {
    if let Some(data) = spec.initial_data.take() {
        if cache.get_query_data::<T>(&spec.key).is_none() {
            cache.set_query_data(&spec.key, data);
        }
    }
}

fn needs_mount_fetch<T: Send + Sync + 'static>(cache: &QueryCache, spec: &QuerySpec<T>) -> bool {
    if !spec.policy.enabled {
        return false;
    }
    match spec.policy.refetch_on_mount {
        RefetchOnMount::Always => true,
        RefetchOnMount::IfStale => cache.is_stale(&spec.key, spec.policy.stale_time),
        RefetchOnMount::Never => cache.get_query_data::<T>(&spec.key).is_none(),
    }
}

fn snapshot<T: Send + Sync + 'static>(
    cache: &QueryCache,
    spec: &QuerySpec<T>,
    fetching: bool,
) -> QueryResult<T> {
    // A disabled query reports nothing, even if another observer filled the key
    if !spec.policy.enabled {
        return QueryResult {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_fetching: false,
            updated_at: None,
        };
    }

    let data = cache.get_query_data::<T>(&spec.key);
    let state = cache.query_state(&spec.key);
    let error = state.as_ref().and_then(|s| s.error.clone());
    let updated_at = state.and_then(|s| s.updated_at);

    let status = if error.is_some() {
        QueryStatus::Error
    } else if data.is_some() {
        QueryStatus::Success
    } else if fetching {
        QueryStatus::Loading
    } else {
        QueryStatus::Idle
    };

    QueryResult {
        data,
        error,
        status,
        is_fetching: fetching,
        updated_at,
    }
}

fn make_ticker(policy: &QueryPolicy) -> Option<Interval> {
    let period = policy.refetch_interval.filter(|p| !p.is_zero() && policy.enabled)?;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn refresh<T: Send + Sync + 'static>(
    cache: &QueryCache,
    spec: &QuerySpec<T>,
    state: &watch::Sender<QueryResult<T>>,
) {
    state.send_replace(snapshot(cache, spec, true));

    let fetcher = Arc::clone(&spec.fetcher);
    // Errors are recorded in the cache and surfaced through the snapshot
    let _ = cache.fetch_fresh(&spec.key, move || fetcher()).await;

    state.send_replace(snapshot(cache, spec, false));
}

async fn drive<T: Send + Sync + 'static>(
    cache: Arc<QueryCache>,
    mut spec: QuerySpec<T>,
    fetch_now: bool,
    state: watch::Sender<QueryResult<T>>,
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    mut events: broadcast::Receiver<CacheEvent>,
) {
    if fetch_now {
        refresh(&cache, &spec, &state).await;
    }

    let mut ticker = make_ticker(&spec.policy);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Refetch) => {
                    if spec.policy.enabled {
                        refresh(&cache, &spec, &state).await;
                    }
                }
                Some(Command::SetSpec(next)) => {
                    let key_changed = next.key != spec.key;
                    spec = next;
                    ticker = make_ticker(&spec.policy);
                    if key_changed && needs_mount_fetch(&cache, &spec) {
                        refresh(&cache, &spec, &state).await;
                    } else {
                        state.send_replace(snapshot(&cache, &spec, false));
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(CacheEvent::Invalidated(prefix)) => {
                    if spec.policy.enabled && spec.key.starts_with(&prefix) {
                        debug!(key = %spec.key, prefix = %prefix, "Refetching invalidated query");
                        refresh(&cache, &spec, &state).await;
                    }
                }
                Ok(CacheEvent::Updated(key)) => {
                    if key == spec.key {
                        state.send_replace(snapshot(&cache, &spec, false));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(key = %spec.key, skipped = skipped, "Query observer lagged behind cache events");
                    if spec.policy.enabled && cache.is_stale(&spec.key, spec.policy.stale_time) {
                        refresh(&cache, &spec, &state).await;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tick(&mut ticker) => {
                refresh(&cache, &spec, &state).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_spec(key: QueryKey, calls: Arc<AtomicUsize>) -> QuerySpec<usize> {
        QuerySpec::new(key, move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(n)
            }
        })
    }

    async fn wait_for_data(observer: &QueryObserver<usize>, expected: usize) {
        let mut rx = observer.watch();
        rx.wait_for(|r| r.data.as_deref() == Some(&expected) && !r.is_fetching)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fetches_and_publishes() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let observer = QueryObserver::mount(
            Arc::clone(&cache),
            counting_spec(QueryKey::new("dashboard-streams"), Arc::clone(&calls)),
        );

        // Nothing cached and the fetch runs on the task
        let first = observer.current();
        assert_eq!(first.status, QueryStatus::Loading);
        assert!(first.is_fetching);

        wait_for_data(&observer, 1).await;
        assert_eq!(observer.current().status, QueryStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.observer_count(&QueryKey::new("dashboard-streams")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_mounts_share_one_fetch() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("dashboard-alerts").with("active");

        let a = QueryObserver::mount(Arc::clone(&cache), counting_spec(key.clone(), Arc::clone(&calls)));
        let b = QueryObserver::mount(Arc::clone(&cache), counting_spec(key.clone(), Arc::clone(&calls)));

        wait_for_data(&a, 1).await;
        wait_for_data(&b, 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.observer_count(&key), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_fetches() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = counting_spec(QueryKey::new("stream-activity").with(""), Arc::clone(&calls))
            .with_policy(QueryPolicy::default().enabled(false));

        let observer = QueryObserver::mount(Arc::clone(&cache), spec);
        observer.refetch();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer.current().status, QueryStatus::Idle);
        assert!(!observer.current().is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_hides_cached_data() {
        let cache = Arc::new(QueryCache::with_defaults());
        let key = QueryKey::new("employee-dashboard").with("streams").with("emp-1");
        cache.set_query_data(&key, 7usize);

        let spec = counting_spec(key, Arc::new(AtomicUsize::new(0)))
            .with_policy(QueryPolicy::default().enabled(false));
        let observer = QueryObserver::mount(Arc::clone(&cache), spec);

        let result = observer.current();
        assert_eq!(result.status, QueryStatus::Idle);
        assert!(result.data.is_none());
        assert!(result.updated_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_triggers_refetch() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("payment-stream").with("employee-streams").with("emp-1");
        let observer = QueryObserver::mount(
            Arc::clone(&cache),
            counting_spec(key, Arc::clone(&calls))
                .with_policy(QueryPolicy::default().stale_time(Duration::from_secs(3600))),
        );
        wait_for_data(&observer, 1).await;

        cache.invalidate(&QueryKey::new("payment-stream"));
        wait_for_data(&observer, 2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_invalidation_is_ignored() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let observer = QueryObserver::mount(
            Arc::clone(&cache),
            counting_spec(QueryKey::new("dashboard-employees"), Arc::clone(&calls)),
        );
        wait_for_data(&observer, 1).await;

        cache.invalidate(&QueryKey::new("dashboard-alerts"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_interval_polls() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = QueryPolicy::default()
            .stale_time(Duration::from_secs(30))
            .refetch_interval(Duration::from_secs(60));
        let observer = QueryObserver::mount(
            Arc::clone(&cache),
            counting_spec(QueryKey::new("notification-counts"), Arc::clone(&calls)).with_policy(policy),
        );

        wait_for_data(&observer, 1).await;
        wait_for_data(&observer, 2).await;
        wait_for_data(&observer, 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_data_hydrates_without_loading() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = counting_spec(QueryKey::new("dashboard-activity").with(10u32), Arc::clone(&calls))
            .with_policy(QueryPolicy::default().stale_time(Duration::from_secs(30)))
            .with_initial_data(42);

        let observer = QueryObserver::mount(Arc::clone(&cache), spec);
        let first = observer.current();
        assert_eq!(first.status, QueryStatus::Success);
        assert_eq!(first.data.as_deref(), Some(&42));
        assert!(!first.is_fetching);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_on_mount_always() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("dashboard-employees");
        cache.set_query_data(&key, 0usize);

        let spec = counting_spec(key, Arc::clone(&calls)).with_policy(
            QueryPolicy::default()
                .stale_time(Duration::from_secs(3600))
                .refetch_on_mount(RefetchOnMount::Always),
        );
        let observer = QueryObserver::mount(Arc::clone(&cache), spec);
        wait_for_data(&observer, 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_surfaces_status() {
        let cache = Arc::new(QueryCache::with_defaults());
        let spec: QuerySpec<usize> = QuerySpec::new(QueryKey::new("dashboard-employees"), || async {
            Err(FetchError::new("Failed to load employees"))
        });

        let observer = QueryObserver::mount(Arc::clone(&cache), spec);
        let mut rx = observer.watch();
        let result = rx
            .wait_for(|r| r.status == QueryStatus::Error)
            .await
            .unwrap()
            .clone();
        assert_eq!(result.error.unwrap().message(), "Failed to load employees");
        assert!(result.data.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_spec_switches_key() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let open = QueryKey::new("dashboard-alerts").with("open");
        let resolved = QueryKey::new("dashboard-alerts").with("resolved");

        let mut observer =
            QueryObserver::mount(Arc::clone(&cache), counting_spec(open.clone(), Arc::clone(&calls)));
        wait_for_data(&observer, 1).await;

        observer.set_spec(counting_spec(resolved.clone(), Arc::clone(&calls)));
        wait_for_data(&observer, 2).await;
        assert_eq!(cache.observer_count(&open), 0);
        assert_eq!(cache.observer_count(&resolved), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unmounts() {
        let cache = Arc::new(QueryCache::with_defaults());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("dashboard-streams");
        let observer = QueryObserver::mount(Arc::clone(&cache), counting_spec(key.clone(), calls));
        wait_for_data(&observer, 1).await;

        drop(observer);
        assert_eq!(cache.observer_count(&key), 0);
    }

    #[tokio::test]
    async fn test_fetch_through_disabled() {
        let cache = QueryCache::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = counting_spec(QueryKey::new("dashboard-audit-trail"), Arc::clone(&calls))
            .with_policy(QueryPolicy::default().enabled(false));

        assert!(spec.fetch_through(&cache).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

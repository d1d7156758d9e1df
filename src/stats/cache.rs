//! Stale-while-revalidate query cache
//!
//! Each key holds the last good value, the last error and at most one
//! in-flight load. Reads never wait: they return whatever is cached and kick
//! off a background load when the value is missing or stale. Failed loads are
//! not retried until another stale period has passed.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::{MetricsError, Result};

/// Produces a fresh value for a key
pub type Loader<K, T> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<T>> + Send + Sync>;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

/// Freshness and polling settings of one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// How long a value counts as fresh
    pub stale_time: Duration,
    /// Background reload period, `None` disables polling
    pub poll_interval: Option<Duration>,
}

impl RefreshPolicy {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            poll_interval: None,
        }
    }

    pub fn with_polling(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval.filter(|i| !i.is_zero());
        self
    }
}

/// Point-in-time view of one key
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last successfully loaded value
    pub data: Option<Arc<T>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// No value yet and a load is running
    pub is_loading: bool,
    /// A load is running
    pub is_fetching: bool,
    pub is_stale: bool,
    /// Error of the most recent load, cleared by the next success
    pub error: Option<MetricsError>,
}

impl<T> QueryState<T> {
    /// Empty state mirroring the progress of a prerequisite query
    pub fn waiting_on<U>(prerequisite: &QueryState<U>) -> Self {
        Self {
            data: None,
            updated_at: None,
            is_loading: prerequisite.is_fetching,
            is_fetching: prerequisite.is_fetching,
            is_stale: true,
            error: prerequisite.error.clone(),
        }
    }
}

struct Entry<T> {
    data: Option<Arc<T>>,
    loaded_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    last_attempt: Option<Instant>,
    last_read: Option<Instant>,
    error: Option<MetricsError>,
    in_flight: Option<SharedLoad<T>>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            loaded_at: None,
            updated_at: None,
            last_attempt: None,
            last_read: None,
            error: None,
            in_flight: None,
        }
    }
}

impl<T> Entry<T> {
    fn is_stale(&self, stale_time: Duration) -> bool {
        self.loaded_at.is_none_or(|t| t.elapsed() >= stale_time)
    }

    /// Whether a read should start a background load
    fn wants_load(&self, stale_time: Duration) -> bool {
        self.in_flight.is_none()
            && self.is_stale(stale_time)
            && self.last_attempt.is_none_or(|t| t.elapsed() >= stale_time)
    }
}

struct Inner<K, T> {
    name: &'static str,
    loader: Loader<K, T>,
    policy: RefreshPolicy,
    entries: Mutex<HashMap<K, Entry<T>>>,
    /// Runtime for background loads started outside of it (server threads)
    runtime: Option<Handle>,
}

impl<K, T> Inner<K, T> {
    fn entries(&self) -> MutexGuard<'_, HashMap<K, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keyed cache with de-duplicated background loads
pub struct QueryCache<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for QueryCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> QueryCache<K, T>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: RefreshPolicy, loader: Loader<K, T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                loader,
                policy,
                entries: Mutex::new(HashMap::new()),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }

    /// Non-blocking read. Starts a background load when the value is
    /// missing or stale and none is running.
    pub fn read(&self, key: &K) -> QueryState<T> {
        let stale_time = self.inner.policy.stale_time;
        let (mut state, wants_load) = {
            let mut entries = self.inner.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.last_read = Some(Instant::now());
            (
                QueryState {
                    data: entry.data.clone(),
                    updated_at: entry.updated_at,
                    is_loading: entry.data.is_none() && entry.in_flight.is_some(),
                    is_fetching: entry.in_flight.is_some(),
                    is_stale: entry.is_stale(stale_time),
                    error: entry.error.clone(),
                },
                entry.wants_load(stale_time),
            )
        };

        if wants_load {
            match self.runtime() {
                Some(_) => {
                    drop(self.start(key.clone()));
                    state.is_fetching = true;
                    state.is_loading = state.data.is_none();
                }
                None => debug!(
                    "[cache:{}] No runtime, not loading {:?}",
                    self.inner.name, key
                ),
            }
        }
        state
    }

    /// Load `key` now, joining a load already in flight.
    pub async fn refresh(&self, key: K) -> Result<Arc<T>> {
        self.start(key).await
    }

    /// Cached value when fresh, otherwise wait for a load.
    pub async fn get(&self, key: K) -> Result<Arc<T>> {
        let fresh = {
            let mut entries = self.inner.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.last_read = Some(Instant::now());
            if entry.is_stale(self.inner.policy.stale_time) {
                None
            } else {
                entry.data.clone()
            }
        };
        match fresh {
            Some(data) => Ok(data),
            None => self.refresh(key).await,
        }
    }

    /// Mark `key` stale so the next read reloads it.
    pub fn invalidate(&self, key: &K) {
        if let Some(entry) = self.inner.entries().get_mut(key) {
            entry.loaded_at = None;
            entry.last_attempt = None;
        }
    }

    /// Reload `pinned`, plus every key read within the last poll interval,
    /// every poll interval until the handle is aborted.
    ///
    /// Returns `None` when polling is disabled. The first tick fires at once.
    pub fn spawn_poller(&self, pinned: K) -> Option<JoinHandle<()>> {
        let period = self.inner.policy.poll_interval?;
        let cache = self.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let keys = cache.active_keys(&pinned, period);
                debug!("[cache:{}] Polling {:?}", cache.inner.name, keys);
                // Errors are recorded on the entries
                join_all(keys.into_iter().map(|key| cache.refresh(key))).await;
            }
        }))
    }

    /// `pinned` followed by the other keys read within `window`
    fn active_keys(&self, pinned: &K, window: Duration) -> Vec<K> {
        let entries = self.inner.entries();
        let mut keys = vec![pinned.clone()];
        keys.extend(
            entries
                .iter()
                .filter(|(key, entry)| {
                    *key != pinned && entry.last_read.is_some_and(|t| t.elapsed() <= window)
                })
                .map(|(key, _)| key.clone()),
        );
        keys
    }

    fn runtime(&self) -> Option<Handle> {
        Handle::try_current()
            .ok()
            .or_else(|| self.inner.runtime.clone())
    }

    fn start(&self, key: K) -> SharedLoad<T> {
        let mut entries = self.inner.entries();
        let entry = entries.entry(key.clone()).or_default();
        if let Some(in_flight) = &entry.in_flight {
            return in_flight.clone();
        }

        let inner = Arc::clone(&self.inner);
        let load = async move {
            let result = (inner.loader)(key.clone()).await.map(Arc::new);
            complete(&inner, &key, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(load.clone());
        entry.last_attempt = Some(Instant::now());
        drop(entries);

        // Run to completion even if every caller drops its future
        if let Some(handle) = self.runtime() {
            let background = load.clone();
            handle.spawn(async move {
                let _ = background.await;
            });
        }
        load
    }
}

fn complete<K, T>(inner: &Inner<K, T>, key: &K, result: &Result<Arc<T>>)
where
    K: Eq + Hash + Clone + Debug,
{
    let mut entries = inner.entries();
    let entry = entries.entry(key.clone()).or_default();
    entry.in_flight = None;
    match result {
        Ok(data) => {
            entry.data = Some(Arc::clone(data));
            entry.loaded_at = Some(Instant::now());
            entry.updated_at = Some(Utc::now());
            entry.error = None;
            debug!("[cache:{}] Loaded {:?}", inner.name, key);
        }
        Err(e) => {
            warn!("[cache:{}] Load of {:?} failed: {}", inner.name, key, e);
            entry.error = Some(e.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failure() -> MetricsError {
        MetricsError::Network {
            url: "http://ojs".to_string(),
            message: "connection refused".to_string(),
        }
    }

    /// Loader returning the call number, failing on the calls listed in `fail_on`.
    fn counting(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail_on: &'static [usize],
    ) -> Loader<&'static str, usize> {
        Arc::new(move |_key: &'static str| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                if fail_on.contains(&n) { Err(failure()) } else { Ok(n) }
            }
            .boxed()
        })
    }

    fn cache(
        stale: Duration,
        delay: Duration,
        fail_on: &'static [usize],
    ) -> (QueryCache<&'static str, usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = counting(calls.clone(), delay, fail_on);
        (QueryCache::new("test", RefreshPolicy::new(stale), loader), calls)
    }

    #[tokio::test]
    async fn test_fresh_value_is_served_from_cache() {
        let (cache, calls) = cache(Duration::from_secs(60), Duration::ZERO, &[]);
        assert_eq!(*cache.get("all").await.unwrap(), 1);
        assert_eq!(*cache.get("all").await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // keys are independent
        assert_eq!(*cache.get("ter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_load() {
        let (cache, calls) = cache(Duration::from_secs(60), Duration::from_millis(50), &[]);
        let (a, b) = tokio::join!(cache.refresh("all"), cache.refresh("all"));
        assert_eq!(*a.unwrap(), 1);
        assert_eq!(*b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_never_blocks() {
        let (cache, calls) = cache(Duration::from_secs(60), Duration::from_millis(30), &[]);

        let first = cache.read(&"all");
        assert!(first.data.is_none());
        assert!(first.is_loading);
        assert!(first.is_fetching);

        // a second read joins the running load
        let second = cache.read(&"all");
        assert!(second.is_loading);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let done = cache.read(&"all");
        assert_eq!(done.data.as_deref(), Some(&1));
        assert!(!done.is_loading);
        assert!(!done.is_stale);
        assert!(done.updated_at.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_is_kept_next_to_last_good_value() {
        let (cache, _) = cache(Duration::from_secs(60), Duration::ZERO, &[2]);
        cache.refresh("all").await.unwrap();

        assert!(cache.refresh("all").await.is_err());
        let state = cache.read(&"all");
        assert_eq!(state.data.as_deref(), Some(&1));
        assert_eq!(state.error, Some(failure()));
        assert!(!state.is_fetching);

        assert_eq!(*cache.refresh("all").await.unwrap(), 3);
        assert_eq!(cache.read(&"all").error, None);
    }

    #[tokio::test]
    async fn test_stale_read_triggers_background_load() {
        let (cache, calls) = cache(Duration::from_millis(20), Duration::ZERO, &[]);
        cache.get("all").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let state = cache.read(&"all");
        assert!(state.is_stale);
        assert!(state.is_fetching);
        assert!(!state.is_loading);
        assert_eq!(state.data.as_deref(), Some(&1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.read(&"all").data.as_deref(), Some(&2));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_retried_until_stale() {
        let (cache, calls) = cache(Duration::from_secs(60), Duration::ZERO, &[1]);
        assert!(cache.refresh("all").await.is_err());

        let state = cache.read(&"all");
        assert!(state.data.is_none());
        assert!(!state.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&"all");
        cache.read(&"all");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_poller_reloads_periodically() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RefreshPolicy::new(Duration::from_secs(60))
            .with_polling(Some(Duration::from_millis(20)));
        let cache = QueryCache::new("poll", policy, counting(calls.clone(), Duration::ZERO, &[]));

        let handle = cache.spawn_poller("all").unwrap();
        tokio::time::sleep(Duration::from_millis(90)).await;
        handle.abort();

        assert!(calls.load(Ordering::SeqCst) >= 3);
        let disabled = QueryCache::new(
            "off",
            RefreshPolicy::new(Duration::from_secs(1)),
            counting(calls, Duration::ZERO, &[]),
        );
        assert!(disabled.spawn_poller("all").is_none());
    }

    #[tokio::test]
    async fn test_poller_follows_recently_read_keys() {
        let loads = Arc::new(Mutex::new(Vec::new()));
        let recorder = loads.clone();
        let loader: Loader<&'static str, usize> = Arc::new(move |key: &'static str| {
            let loads = recorder.clone();
            async move {
                loads.lock().unwrap().push(key);
                Ok(0)
            }
            .boxed()
        });
        let policy = RefreshPolicy::new(Duration::from_secs(60))
            .with_polling(Some(Duration::from_millis(40)));
        let cache = QueryCache::new("poll", policy, loader);
        let count = |key: &str| loads.lock().unwrap().iter().filter(|k| **k == key).count();

        cache.get("ter").await.unwrap();
        cache.get("old").await.unwrap();
        // "old" is not read again and drops out of the active window
        tokio::time::sleep(Duration::from_millis(60)).await;

        let handle = cache.spawn_poller("all").unwrap();
        for _ in 0..8 {
            cache.read(&"ter");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        handle.abort();

        assert!(count("all") >= 3);
        assert!(count("ter") >= 3);
        assert_eq!(count("old"), 1);
    }
}

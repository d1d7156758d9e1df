//! Cached dashboard access
//!
//! [`MetricsService`] wires discovery, the aggregator and two query caches
//! together: one for the journal list and one per journal selection.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::info;

use super::aggregate::{Aggregator, selected_path};
use super::cache::{QueryCache, QueryState, RefreshPolicy};
use super::discovery::discover_contexts;
use super::fetcher::MetricsFetcher;
use super::models::AggregatedDashboardMetrics;
use crate::config::Config;
use crate::error::{MetricsError, Result};
use crate::ojs::{ConnectionReport, JournalApi, JournalContext, OjsClient, check_connection};

/// Cache key of a dashboard snapshot, `None` = all journals
pub type DashboardKey = Option<String>;

fn dashboard_key(selected: Option<&str>) -> DashboardKey {
    selected_path(selected).map(str::to_string)
}

fn is_enabled(contexts: &[JournalContext], path: &str) -> bool {
    contexts.iter().any(|c| c.url_path == path)
}

#[derive(Clone)]
pub struct MetricsService {
    config: Arc<Config>,
    api: Arc<dyn JournalApi>,
    contexts: QueryCache<(), Vec<JournalContext>>,
    dashboard: QueryCache<DashboardKey, AggregatedDashboardMetrics>,
}

impl MetricsService {
    /// Service over the HTTP client built from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Arc::new(OjsClient::new(config)))
    }

    pub fn new(config: &Config, api: Arc<dyn JournalApi>) -> Self {
        let config = Arc::new(config.clone());

        let contexts_policy =
            RefreshPolicy::new(Duration::from_millis(config.stale_times.contexts_ms));
        let contexts: QueryCache<(), Vec<JournalContext>> = {
            let api = api.clone();
            let config = config.clone();
            QueryCache::new(
                "contexts",
                contexts_policy,
                Arc::new(move |_: ()| {
                    let api = api.clone();
                    let config = config.clone();
                    async move { discover_contexts(api.as_ref(), &config).await }.boxed()
                }),
            )
        };

        let poll_interval = config
            .features
            .auto_refresh
            .then(|| Duration::from_millis(config.refresh_intervals.dashboard_metrics_ms));
        let dashboard_policy =
            RefreshPolicy::new(Duration::from_millis(config.stale_times.dashboard_metrics_ms))
                .with_polling(poll_interval);
        let aggregator = Aggregator::new(MetricsFetcher::new(api.clone(), &config));
        let dashboard: QueryCache<DashboardKey, AggregatedDashboardMetrics> = {
            let contexts = contexts.clone();
            QueryCache::new(
                "dashboard",
                dashboard_policy,
                Arc::new(move |key: DashboardKey| {
                    let aggregator = aggregator.clone();
                    let contexts = contexts.clone();
                    async move {
                        let list = contexts.get(()).await?;
                        aggregator.aggregate(list.to_vec(), key.as_deref()).await
                    }
                    .boxed()
                }),
            )
        };

        Self {
            config,
            api,
            contexts,
            dashboard,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enabled journals, cached for `stale_times.contexts_ms`
    pub async fn contexts(&self) -> Result<Arc<Vec<JournalContext>>> {
        self.contexts.get(()).await
    }

    pub fn read_contexts(&self) -> QueryState<Vec<JournalContext>> {
        self.contexts.read(&())
    }

    /// Snapshot for `selected` (`None` or `"all"` = every journal), loading
    /// it when missing or stale.
    ///
    /// A selection outside the enabled journals fails with
    /// [`MetricsError::UnknownJournal`] without touching the API.
    pub async fn dashboard(
        &self,
        selected: Option<&str>,
    ) -> Result<Arc<AggregatedDashboardMetrics>> {
        let key = self.checked_key(selected).await?;
        self.dashboard.get(key).await
    }

    /// Reload a snapshot regardless of its age.
    pub async fn refresh_dashboard(
        &self,
        selected: Option<&str>,
    ) -> Result<Arc<AggregatedDashboardMetrics>> {
        let key = self.checked_key(selected).await?;
        self.dashboard.refresh(key).await
    }

    /// Non-blocking read of a snapshot.
    ///
    /// `None` when `selected` is not an enabled journal. Until the journal
    /// list is loaded, a selection reads as waiting on it.
    pub fn read_dashboard(
        &self,
        selected: Option<&str>,
    ) -> Option<QueryState<AggregatedDashboardMetrics>> {
        let key = dashboard_key(selected);
        if let Some(path) = &key {
            let contexts = self.contexts.read(&());
            match &contexts.data {
                Some(list) if !is_enabled(list, path) => return None,
                Some(_) => {}
                None => return Some(QueryState::waiting_on(&contexts)),
            }
        }
        Some(self.dashboard.read(&key))
    }

    async fn checked_key(&self, selected: Option<&str>) -> Result<DashboardKey> {
        let key = dashboard_key(selected);
        if let Some(path) = &key {
            if !is_enabled(&self.contexts().await?, path) {
                return Err(MetricsError::UnknownJournal { path: path.clone() });
            }
        }
        Ok(key)
    }

    /// Poll snapshots when `features.auto_refresh` is set: the all-journals
    /// one always, selected journals while they are being read.
    pub fn start_auto_refresh(&self) -> Option<JoinHandle<()>> {
        let handle = self.dashboard.spawn_poller(None)?;
        if let Some(interval) = self.dashboard.policy().poll_interval {
            info!("[metrics] Auto refresh every {}s", interval.as_secs());
        }
        Some(handle)
    }

    /// Check the statistics endpoints of `context` (default context if `None`).
    pub async fn check_connection(&self, context: Option<&str>) -> ConnectionReport {
        let context = context.unwrap_or(&self.config.default_context);
        check_connection(self.api.as_ref(), self.config.is_auth_configured(), context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ojs::fake::{FakeApi, FakeJournal, context};

    fn fake_service(config: Config) -> (MetricsService, Arc<FakeApi>) {
        let api = Arc::new(
            FakeApi::new()
                .contexts(Ok(vec![context(1, "a", true), context(2, "b", true)]))
                .journal("a", FakeJournal::with_abstract_views(1, 10))
                .journal("b", FakeJournal::with_abstract_views(2, 20)),
        );
        (MetricsService::new(&config, api.clone()), api)
    }

    fn count(api: &FakeApi, call: &str) -> usize {
        api.calls().iter().filter(|c| c.as_str() == call).count()
    }

    #[tokio::test]
    async fn test_all_and_selected_snapshots_are_cached_separately() {
        let (service, api) = fake_service(Config::default());

        let all = service.dashboard(None).await.unwrap();
        assert_eq!(all.metrics.total_abstract_views, 30);
        assert!(Arc::ptr_eq(&all, &service.dashboard(Some("all")).await.unwrap()));

        let one = service.dashboard(Some("b")).await.unwrap();
        assert_eq!(one.metrics.total_abstract_views, 20);
        assert_eq!(one.selected_context.as_deref(), Some("b"));

        // contexts are discovered once
        assert_eq!(count(&api, "index:contexts"), 1);
        assert_eq!(count(&api, "a:publications"), 1);
    }

    #[tokio::test]
    async fn test_unknown_selection_is_rejected_without_fetching() {
        let (service, api) = fake_service(Config::default());

        let err = service.dashboard(Some("zzz")).await.unwrap_err();
        assert_eq!(err, MetricsError::UnknownJournal { path: "zzz".to_string() });
        assert!(service.refresh_dashboard(Some("zzz")).await.is_err());
        assert!(service.read_dashboard(Some("zzz")).is_none());
        assert!(api.calls().iter().all(|c| !c.starts_with("zzz:")));

        assert!(service.read_dashboard(Some("a")).is_some());
    }

    #[tokio::test]
    async fn test_selection_waits_for_journal_list() {
        let api = Arc::new(
            FakeApi::new()
                .contexts(Ok(vec![context(1, "a", true)]))
                .journal("a", FakeJournal::with_abstract_views(1, 10))
                .delay(Duration::from_millis(30)),
        );
        let service = MetricsService::new(&Config::default(), api.clone());

        let state = service.read_dashboard(Some("a")).unwrap();
        assert!(state.data.is_none());
        assert!(state.is_loading);
        assert!(api.calls().iter().all(|c| !c.starts_with("a:")));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(service.read_dashboard(Some("nope")).is_none());
        let state = service.read_dashboard(Some("a")).unwrap();
        assert!(state.is_fetching || state.data.is_some());
    }

    #[tokio::test]
    async fn test_refresh_bypasses_fresh_snapshot() {
        let (service, api) = fake_service(Config::default());
        service.dashboard(None).await.unwrap();
        service.refresh_dashboard(None).await.unwrap();
        assert_eq!(count(&api, "a:publications"), 2);
        assert_eq!(count(&api, "index:contexts"), 1);
    }

    #[tokio::test]
    async fn test_auto_refresh_follows_feature_flag() {
        let mut config = Config::default();
        config.features.auto_refresh = false;
        let (service, _) = fake_service(config);
        assert!(service.start_auto_refresh().is_none());

        let (service, _) = fake_service(Config::default());
        let handle = service.start_auto_refresh().unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_connection_check_uses_default_context() {
        let mut config = Config::default();
        config.default_context = "a".to_string();
        config.auth.api_key = "token".to_string();
        let (service, _) = fake_service(config);

        let report = service.check_connection(None).await;
        assert!(report.connected);
        assert_eq!(report.available(), 3);
    }
}

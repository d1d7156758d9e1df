//! Cross-journal aggregation
//!
//! [`Aggregator::aggregate`] fans the per-journal fetch out over the enabled
//! journals and merges the results through the rule table in [`rules`].

pub mod rules;

pub use rules::{
    AGGREGATE_ACTIVITY_CAP, AGGREGATE_TOP_PUBLICATIONS_CAP, Contribution, FieldRule,
    MERGE_RULES, MergeRule, ScalarRule, merge, merge_timelines, rule_for,
};

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{info, warn};

use super::fetcher::MetricsFetcher;
use super::models::{AggregatedDashboardMetrics, DashboardMetrics};
use crate::error::{MetricsError, Result};
use crate::ojs::JournalContext;

/// Selector value meaning "every journal"
pub const ALL_CONTEXTS: &str = "all";

/// Normalize a journal selector: `None`, empty and `"all"` select everything.
pub fn selected_path(selected: Option<&str>) -> Option<&str> {
    selected
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ALL_CONTEXTS)
}

#[derive(Clone)]
pub struct Aggregator {
    fetcher: MetricsFetcher,
}

impl Aggregator {
    pub fn new(fetcher: MetricsFetcher) -> Self {
        Self { fetcher }
    }

    /// Build a snapshot over `contexts`, or over `selected` alone.
    ///
    /// With a selection or a single journal, the fetch error propagates.
    /// Otherwise failed journals are dropped, and only a total failure is an
    /// error ([`MetricsError::AllContextsFailed`]).
    pub async fn aggregate(
        &self,
        contexts: Vec<JournalContext>,
        selected: Option<&str>,
    ) -> Result<AggregatedDashboardMetrics> {
        if let Some(path) = selected_path(selected) {
            let metrics = self.fetcher.fetch(path).await?;
            return Ok(single(contexts, path, metrics, Some(path.to_string())));
        }

        match contexts.len() {
            0 => Err(MetricsError::NoEnabledJournals),
            1 => {
                let path = contexts[0].url_path.clone();
                let metrics = self.fetcher.fetch(&path).await?;
                Ok(single(contexts, &path, metrics, None))
            }
            _ => self.aggregate_all(contexts).await,
        }
    }

    async fn aggregate_all(
        &self,
        contexts: Vec<JournalContext>,
    ) -> Result<AggregatedDashboardMetrics> {
        let results = join_all(contexts.iter().map(|c| self.fetcher.fetch(&c.url_path))).await;

        let mut per_context = BTreeMap::new();
        let mut order = Vec::new();
        for (context, result) in contexts.iter().zip(results) {
            match result {
                Ok(metrics) => {
                    order.push(context.url_path.clone());
                    per_context.insert(context.url_path.clone(), metrics);
                }
                Err(e) => warn!("[aggregate] Dropping {}: {}", context.url_path, e),
            }
        }

        if per_context.is_empty() {
            return Err(MetricsError::AllContextsFailed {
                attempted: contexts.len(),
            });
        }

        // Discovery order, so ties in sorted lists stay deterministic
        let parts: Vec<Contribution<'_>> = order
            .iter()
            .filter_map(|path| {
                per_context.get(path).map(|metrics| Contribution {
                    context: path.as_str(),
                    metrics,
                })
            })
            .collect();
        let metrics = merge(&parts);

        info!(
            "[aggregate] Merged {}/{} journals: abstract_views={}, downloads={}, publications={}",
            per_context.len(),
            contexts.len(),
            metrics.total_abstract_views,
            metrics.total_downloads,
            metrics.total_publications
        );

        Ok(AggregatedDashboardMetrics {
            metrics,
            contexts,
            per_context,
            selected_context: None,
        })
    }
}

fn single(
    contexts: Vec<JournalContext>,
    path: &str,
    metrics: DashboardMetrics,
    selected_context: Option<String>,
) -> AggregatedDashboardMetrics {
    AggregatedDashboardMetrics {
        metrics: metrics.clone(),
        contexts,
        per_context: BTreeMap::from([(path.to_string(), metrics)]),
        selected_context,
    }
}

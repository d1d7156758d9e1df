//! Per-journal metrics fetch
//!
//! Six requests go out concurrently. Publication statistics are required; the
//! editorial, averages, users and timeline calls are often restricted to
//! editors or managers, so each of those falls back to an empty default.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use super::models::{
    ActivityItem, ActivityType, DashboardMetrics, PublicationKey, TopPublication, rate_to_percent,
};
use crate::config::Config;
use crate::error::Result;
use crate::ojs::{
    DateRange, EditorialAverages, JournalApi, PublicationStat, PublicationStatsQuery,
    PublicationStatsResponse, StatEntry, TimelineKind, TimelinePoint, TimelineQuery,
    resolve_localized, stat_value,
};

/// Rows kept for the top-publications list
pub const TOP_PUBLICATIONS_CAP: usize = 10;
/// Rows kept for the recent-activity feed
pub const RECENT_ACTIVITY_CAP: usize = 8;
/// Synthetic spacing between activity timestamps
const ACTIVITY_SPACING_SECS: i64 = 120;

const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHORS: &str = "Unknown";

/// Everything fetched for one journal, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawContextStats {
    pub publications: PublicationStatsResponse,
    pub editorial: Vec<StatEntry>,
    pub averages: EditorialAverages,
    pub users: Vec<StatEntry>,
    pub abstract_timeline: Vec<TimelinePoint>,
    pub galley_timeline: Vec<TimelinePoint>,
}

fn count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

impl RawContextStats {
    /// Build the dashboard record for `context`.
    ///
    /// `fetched_at` anchors the synthetic activity timestamps, which step back
    /// two minutes per row so the feed keeps the upstream ordering.
    pub fn normalize(
        &self,
        context: &str,
        locale: &str,
        fetched_at: DateTime<Utc>,
    ) -> DashboardMetrics {
        let items = &self.publications.items;

        let editorial = |key: &str| stat_value(&self.editorial, key).unwrap_or(0.0);
        let users = |key: &str| count(stat_value(&self.users, key).unwrap_or(0.0));

        let received = count(editorial("submissionsReceived"));
        let accepted = count(editorial("submissionsAccepted"));
        let declined = count(editorial("submissionsDeclined"));
        let in_review = match stat_value(&self.editorial, "submissionsInProgress") {
            Some(value) => count(value),
            None => received.saturating_sub(accepted).saturating_sub(declined),
        };

        let total_publications = match self.publications.items_max {
            0 => items.len() as u64,
            max => max,
        };

        let top_publications = items
            .iter()
            .take(TOP_PUBLICATIONS_CAP)
            .map(|item| TopPublication {
                key: PublicationKey {
                    context: context.to_string(),
                    id: item.publication.id,
                },
                title: title_of(item, locale),
                authors: authors_of(item),
                abstract_views: item.abstract_views,
                galley_views: item.galley_views,
                pdf_views: item.pdf_views,
            })
            .collect();

        let recent_activity = items
            .iter()
            .take(RECENT_ACTIVITY_CAP)
            .enumerate()
            .map(|(idx, item)| ActivityItem {
                id: item.publication.id.to_string(),
                title: title_of(item, locale),
                authors: authors_of(item),
                kind: ActivityType::classify(item.abstract_views, item.pdf_views),
                abstract_views: item.abstract_views,
                pdf_views: item.pdf_views,
                timestamp: fetched_at
                    - ChronoDuration::seconds(idx as i64 * ACTIVITY_SPACING_SECS),
            })
            .collect();

        DashboardMetrics {
            total_downloads: total(items, |i| i.pdf_views + i.html_views + i.other_views),
            total_abstract_views: total(items, |i| i.abstract_views),
            total_galley_views: total(items, |i| i.galley_views),
            total_pdf_views: total(items, |i| i.pdf_views),
            total_html_views: total(items, |i| i.html_views),
            total_other_views: total(items, |i| i.other_views),
            total_publications,

            active_readers: users("reader"),
            total_authors: users("author"),
            total_reviewers: users("reviewer"),
            total_editors: users("editor"),
            total_managers: users("manager"),
            total_users: self.users.iter().map(|s| count(s.value)).sum(),

            submissions_received: received,
            submissions_accepted: accepted,
            submissions_declined: declined,
            submissions_declined_desk_reject: count(editorial("submissionsDeclinedDeskReject")),
            submissions_declined_post_review: count(editorial("submissionsDeclinedPostReview")),
            submissions_published: count(editorial("submissionsPublished")),
            submissions_skipped: count(editorial("submissionsSkipped")),
            submissions_imported: count(editorial("submissionsImported")),
            submissions_in_review: in_review,
            days_to_decision: editorial("daysToDecision"),
            days_to_accept: editorial("daysToAccept"),
            days_to_reject: editorial("daysToReject"),
            acceptance_rate: rate_to_percent(editorial("acceptanceRate")),
            decline_rate: rate_to_percent(editorial("declineRate")),
            declined_desk_rate: rate_to_percent(editorial("declinedDeskRate")),
            declined_review_rate: rate_to_percent(editorial("declinedReviewRate")),

            submissions_per_year: self.averages.submissions_received_per_year,
            accepted_per_year: self.averages.submissions_accepted_per_year,
            declined_per_year: self.averages.submissions_declined_per_year,

            abstract_views_timeline: self.abstract_timeline.clone(),
            galley_views_timeline: self.galley_timeline.clone(),

            recent_activity,
            top_publications,
        }
    }
}

fn total(items: &[PublicationStat], field: fn(&PublicationStat) -> u64) -> u64 {
    items.iter().map(field).sum()
}

fn title_of(item: &PublicationStat, locale: &str) -> String {
    resolve_localized(item.publication.full_title.as_ref(), locale, UNTITLED).to_string()
}

fn authors_of(item: &PublicationStat) -> String {
    item.publication
        .authors_string_short
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(UNKNOWN_AUTHORS)
        .to_string()
}

/// Fetches and normalizes the metrics of a single journal
#[derive(Clone)]
pub struct MetricsFetcher {
    api: Arc<dyn JournalApi>,
    locale: String,
    timeline_days: u32,
}

impl MetricsFetcher {
    pub fn new(api: Arc<dyn JournalApi>, config: &Config) -> Self {
        Self {
            api,
            locale: config.locale.clone(),
            timeline_days: config.statistics.timeline_days,
        }
    }

    /// Issue the six sub-requests and wait for all of them.
    pub async fn fetch_raw(&self, context: &str) -> Result<RawContextStats> {
        let api = self.api.as_ref();
        let timeline = TimelineQuery::monthly(DateRange::last_days(self.timeline_days));
        let count_only = PublicationStatsQuery::count_only();

        let (publications, editorial, averages, users, abstract_timeline, galley_timeline) =
            tokio::join!(
                api.publication_stats(context, &count_only),
                optional(context, "editorial stats", api.editorial_stats(context, None)),
                optional(context, "editorial averages", api.editorial_averages(context)),
                optional(context, "user stats", api.user_stats(context, None)),
                optional(
                    context,
                    TimelineKind::Abstract.label(),
                    api.timeline(context, TimelineKind::Abstract, &timeline)
                ),
                optional(
                    context,
                    TimelineKind::Galley.label(),
                    api.timeline(context, TimelineKind::Galley, &timeline)
                ),
            );

        let publications = publications.inspect_err(|e| {
            warn!("[metrics] Publication stats failed for {}: {}", context, e);
        })?;

        Ok(RawContextStats {
            publications,
            editorial,
            averages,
            users,
            abstract_timeline,
            galley_timeline,
        })
    }

    /// Fetch and normalize the metrics of `context`.
    ///
    /// Fails only when the publication statistics request fails.
    pub async fn fetch(&self, context: &str) -> Result<DashboardMetrics> {
        let raw = self.fetch_raw(context).await?;
        let metrics = raw.normalize(context, &self.locale, Utc::now());
        debug!(
            "[metrics] {}: publications={}, abstract_views={}, downloads={}, acceptance={}%",
            context,
            metrics.total_publications,
            metrics.total_abstract_views,
            metrics.total_downloads,
            metrics.acceptance_rate
        );
        Ok(metrics)
    }
}

/// Await an optional sub-request, logging and defaulting on failure.
async fn optional<T, F>(context: &str, what: &str, request: F) -> T
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    match request.await {
        Ok(value) => value,
        Err(e) => {
            warn!("[metrics] {} unavailable for {}: {}", what, context, e);
            T::default()
        }
    }
}

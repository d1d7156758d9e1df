//! Dashboard data models
//!
//! These structures are what the presentation layer consumes. They are built
//! once per refresh and never mutated afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ojs::{JournalContext, TimelinePoint};

/// Normalized metrics of one journal (or the merge of several)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    // Publication views
    pub total_downloads: u64,
    pub total_abstract_views: u64,
    pub total_galley_views: u64,
    pub total_pdf_views: u64,
    pub total_html_views: u64,
    pub total_other_views: u64,
    pub total_publications: u64,

    // Users by role
    pub active_readers: u64,
    pub total_authors: u64,
    pub total_reviewers: u64,
    pub total_editors: u64,
    pub total_managers: u64,
    pub total_users: u64,

    // Editorial workflow
    pub submissions_received: u64,
    pub submissions_accepted: u64,
    pub submissions_declined: u64,
    pub submissions_declined_desk_reject: u64,
    pub submissions_declined_post_review: u64,
    pub submissions_published: u64,
    pub submissions_skipped: u64,
    pub submissions_imported: u64,
    pub submissions_in_review: u64,
    pub days_to_decision: f64,
    pub days_to_accept: f64,
    pub days_to_reject: f64,
    /// Integer percentages (0-100)
    pub acceptance_rate: u32,
    pub decline_rate: u32,
    pub declined_desk_rate: u32,
    pub declined_review_rate: u32,

    // Yearly averages
    pub submissions_per_year: f64,
    pub accepted_per_year: f64,
    pub declined_per_year: f64,

    pub abstract_views_timeline: Vec<TimelinePoint>,
    pub galley_views_timeline: Vec<TimelinePoint>,

    pub recent_activity: Vec<ActivityItem>,
    pub top_publications: Vec<TopPublication>,
}

impl DashboardMetrics {
    /// Whether this journal reported any acceptance or decline rate
    pub fn has_rates(&self) -> bool {
        self.acceptance_rate > 0 || self.decline_rate > 0
    }
}

/// Convert an upstream decimal rate (0.173) to an integer percentage (17).
///
/// Halves round away from zero, so 0.175 becomes 18.
pub fn rate_to_percent(rate: f64) -> u32 {
    let percent = (rate * 100.0).round();
    if percent.is_finite() && percent > 0.0 {
        percent as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Download,
    View,
    /// Not derivable from view statistics; reserved for a citation source
    Citation,
}

impl ActivityType {
    pub fn classify(abstract_views: u64, pdf_views: u64) -> Self {
        if pdf_views > abstract_views {
            Self::Download
        } else {
            Self::View
        }
    }
}

/// Entry of the recent-activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    pub title: String,
    pub authors: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub abstract_views: u64,
    pub pdf_views: u64,
    pub timestamp: DateTime<Utc>,
}

/// Identity of a publication across journals
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicationKey {
    pub context: String,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPublication {
    pub key: PublicationKey,
    pub title: String,
    pub authors: String,
    pub abstract_views: u64,
    pub galley_views: u64,
    pub pdf_views: u64,
}

impl TopPublication {
    /// Popularity used for ranking
    pub fn popularity(&self) -> u64 {
        self.abstract_views + self.pdf_views
    }
}

/// Dashboard snapshot across one or more journals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedDashboardMetrics {
    #[serde(flatten)]
    pub metrics: DashboardMetrics,
    /// Every journal the snapshot was built from
    pub contexts: Vec<JournalContext>,
    /// Journal path -> that journal's own metrics
    pub per_context: BTreeMap<String, DashboardMetrics>,
    /// `None` when the snapshot aggregates everything
    pub selected_context: Option<String>,
}

impl AggregatedDashboardMetrics {
    pub fn is_aggregated(&self) -> bool {
        self.selected_context.is_none() && self.per_context.len() > 1
    }
}

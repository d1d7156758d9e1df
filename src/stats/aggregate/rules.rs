//! Per-field merge rules
//!
//! Every field of [`DashboardMetrics`] has exactly one entry in
//! [`MERGE_RULES`]. Merging applies each entry in turn to an empty record.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::ojs::TimelinePoint;
use crate::stats::models::{ActivityItem, DashboardMetrics, TopPublication};

/// Entries kept in a merged recent-activity feed
pub const AGGREGATE_ACTIVITY_CAP: usize = 10;
/// Entries kept in a merged top-publications list
pub const AGGREGATE_TOP_PUBLICATIONS_CAP: usize = 10;

/// One journal's metrics taking part in a merge
#[derive(Debug, Clone, Copy)]
pub struct Contribution<'a> {
    pub context: &'a str,
    pub metrics: &'a DashboardMetrics,
}

/// How a numeric field combines across journals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarRule {
    /// Arithmetic sum
    Sum,
    /// Rounded mean over the journals reporting a positive value
    AverageOverPositive,
    /// Rounded mean over the journals reporting an acceptance or decline rate
    AverageOverRated,
}

impl ScalarRule {
    pub fn combine(
        &self,
        parts: &[Contribution<'_>],
        value: impl Fn(&DashboardMetrics) -> f64,
    ) -> f64 {
        match self {
            Self::Sum => parts.iter().map(|p| value(p.metrics)).sum(),
            Self::AverageOverPositive => rounded_mean(
                parts
                    .iter()
                    .map(|p| value(p.metrics))
                    .filter(|v| *v > 0.0),
            ),
            Self::AverageOverRated => rounded_mean(
                parts
                    .iter()
                    .filter(|p| p.metrics.has_rates())
                    .map(|p| value(p.metrics)),
            ),
        }
    }
}

fn rounded_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).round() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Scalar(ScalarRule),
    /// Sum values sharing a date, sorted ascending by date
    MergeByDate,
    /// Concatenate, sort, keep the first `cap`
    ConcatSortCap { cap: usize },
}

/// Merge rule bound to one field
pub struct FieldRule {
    pub field: &'static str,
    pub rule: MergeRule,
    apply: fn(&mut DashboardMetrics, &[Contribution<'_>]),
}

impl FieldRule {
    pub fn apply(&self, out: &mut DashboardMetrics, parts: &[Contribution<'_>]) {
        (self.apply)(out, parts)
    }
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("rule", &self.rule)
            .finish()
    }
}

/// Integer `Sum` field, summed without a float round trip
macro_rules! count {
    ($field:ident) => {
        FieldRule {
            field: stringify!($field),
            rule: MergeRule::Scalar(ScalarRule::Sum),
            apply: |out, parts| {
                out.$field = parts
                    .iter()
                    .fold(0u64, |sum, p| sum.saturating_add(p.metrics.$field));
            },
        }
    };
}

macro_rules! scalar {
    ($field:ident, $rule:ident) => {
        FieldRule {
            field: stringify!($field),
            rule: MergeRule::Scalar(ScalarRule::$rule),
            apply: |out, parts| {
                out.$field = ScalarRule::$rule.combine(parts, |m| m.$field as f64) as _;
            },
        }
    };
}

pub static MERGE_RULES: &[FieldRule] = &[
    count!(total_downloads),
    count!(total_abstract_views),
    count!(total_galley_views),
    count!(total_pdf_views),
    count!(total_html_views),
    count!(total_other_views),
    count!(total_publications),
    count!(active_readers),
    count!(total_authors),
    count!(total_reviewers),
    count!(total_editors),
    count!(total_managers),
    count!(total_users),
    count!(submissions_received),
    count!(submissions_accepted),
    count!(submissions_declined),
    count!(submissions_declined_desk_reject),
    count!(submissions_declined_post_review),
    count!(submissions_published),
    count!(submissions_skipped),
    count!(submissions_imported),
    count!(submissions_in_review),
    scalar!(days_to_decision, AverageOverPositive),
    scalar!(days_to_accept, AverageOverPositive),
    scalar!(days_to_reject, AverageOverPositive),
    scalar!(acceptance_rate, AverageOverRated),
    scalar!(decline_rate, AverageOverRated),
    scalar!(declined_desk_rate, AverageOverRated),
    scalar!(declined_review_rate, AverageOverRated),
    scalar!(submissions_per_year, Sum),
    scalar!(accepted_per_year, Sum),
    scalar!(declined_per_year, Sum),
    FieldRule {
        field: "abstract_views_timeline",
        rule: MergeRule::MergeByDate,
        apply: |out, parts| {
            out.abstract_views_timeline = merge_timelines(
                parts
                    .iter()
                    .map(|p| p.metrics.abstract_views_timeline.as_slice()),
            );
        },
    },
    FieldRule {
        field: "galley_views_timeline",
        rule: MergeRule::MergeByDate,
        apply: |out, parts| {
            out.galley_views_timeline = merge_timelines(
                parts
                    .iter()
                    .map(|p| p.metrics.galley_views_timeline.as_slice()),
            );
        },
    },
    FieldRule {
        field: "recent_activity",
        rule: MergeRule::ConcatSortCap {
            cap: AGGREGATE_ACTIVITY_CAP,
        },
        apply: |out, parts| out.recent_activity = merge_activity(parts),
    },
    FieldRule {
        field: "top_publications",
        rule: MergeRule::ConcatSortCap {
            cap: AGGREGATE_TOP_PUBLICATIONS_CAP,
        },
        apply: |out, parts| out.top_publications = merge_top_publications(parts),
    },
];

/// Look up the rule of a field by its snake_case name
pub fn rule_for(field: &str) -> Option<MergeRule> {
    MERGE_RULES.iter().find(|r| r.field == field).map(|r| r.rule)
}

/// Apply every rule of [`MERGE_RULES`] to `parts`.
pub fn merge(parts: &[Contribution<'_>]) -> DashboardMetrics {
    let mut out = DashboardMetrics::default();
    for rule in MERGE_RULES {
        rule.apply(&mut out, parts);
    }
    out
}

/// Sum points sharing a date; result is sorted ascending by date string.
pub fn merge_timelines<'a>(
    series: impl Iterator<Item = &'a [TimelinePoint]>,
) -> Vec<TimelinePoint> {
    let mut by_date: BTreeMap<&str, u64> = BTreeMap::new();
    for point in series.flatten() {
        *by_date.entry(point.date.as_str()).or_default() += point.value;
    }
    by_date
        .into_iter()
        .map(|(date, value)| TimelinePoint {
            date: date.to_string(),
            value,
        })
        .collect()
}

fn merge_activity(parts: &[Contribution<'_>]) -> Vec<ActivityItem> {
    let mut merged: Vec<ActivityItem> = parts
        .iter()
        .flat_map(|p| {
            p.metrics.recent_activity.iter().map(move |item| ActivityItem {
                id: format!("{}-{}", p.context, item.id),
                ..item.clone()
            })
        })
        .collect();
    merged.sort_by_key(|item| Reverse(item.timestamp));
    merged.truncate(AGGREGATE_ACTIVITY_CAP);
    merged
}

fn merge_top_publications(parts: &[Contribution<'_>]) -> Vec<TopPublication> {
    let mut merged: Vec<TopPublication> = parts
        .iter()
        .flat_map(|p| p.metrics.top_publications.iter().cloned())
        .collect();
    merged.sort_by_key(|p| Reverse(p.popularity()));
    merged.truncate(AGGREGATE_TOP_PUBLICATIONS_CAP);
    merged
}

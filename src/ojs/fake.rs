//! In-memory [`JournalApi`] for unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::date_range::DateRange;
use super::endpoints::{JournalApi, PublicationStatsQuery, TimelineKind, TimelineQuery, UserStatus};
use super::types::{
    EditorialAverages, JournalContext, LocalizedString, PublicationStat, PublicationStatsResponse,
    PublicationSummary, StatEntry, TimelinePoint,
};
use crate::error::{MetricsError, Result};

pub(crate) fn http_error(url: &str, status: u16) -> MetricsError {
    MetricsError::Http {
        url: url.to_string(),
        status,
        body: String::new(),
    }
}

pub(crate) fn entry(key: &str, value: f64) -> StatEntry {
    StatEntry {
        key: key.to_string(),
        name: None,
        value,
    }
}

pub(crate) fn point(date: &str, value: u64) -> TimelinePoint {
    TimelinePoint {
        date: date.to_string(),
        value,
    }
}

pub(crate) fn context(id: u64, path: &str, enabled: bool) -> JournalContext {
    JournalContext {
        id,
        url_path: path.to_string(),
        name: LocalizedString::with_locale("en_US", path.to_uppercase()),
        description: None,
        enabled,
        href: String::new(),
    }
}

/// Canned responses for one journal
#[derive(Clone)]
pub(crate) struct FakeJournal {
    pub publications: Result<PublicationStatsResponse>,
    pub editorial: Result<Vec<StatEntry>>,
    pub averages: Result<EditorialAverages>,
    pub users: Result<Vec<StatEntry>>,
    pub abstract_timeline: Result<Vec<TimelinePoint>>,
    pub galley_timeline: Result<Vec<TimelinePoint>>,
}

impl Default for FakeJournal {
    fn default() -> Self {
        Self {
            publications: Ok(PublicationStatsResponse::default()),
            editorial: Ok(Vec::new()),
            averages: Ok(EditorialAverages::default()),
            users: Ok(Vec::new()),
            abstract_timeline: Ok(Vec::new()),
            galley_timeline: Ok(Vec::new()),
        }
    }
}

impl FakeJournal {
    /// A journal with one publication carrying `abstract_views`
    pub fn with_abstract_views(id: u64, abstract_views: u64) -> Self {
        Self {
            publications: Ok(PublicationStatsResponse {
                items: vec![PublicationStat {
                    abstract_views,
                    publication: PublicationSummary {
                        id,
                        ..PublicationSummary::default()
                    },
                    ..PublicationStat::default()
                }],
                items_max: 1,
            }),
            ..Self::default()
        }
    }

    pub fn editorial(mut self, entries: Vec<StatEntry>) -> Self {
        self.editorial = Ok(entries);
        self
    }

    pub fn users(mut self, entries: Vec<StatEntry>) -> Self {
        self.users = Ok(entries);
        self
    }
}

pub(crate) struct FakeApi {
    journals: HashMap<String, FakeJournal>,
    contexts: Result<Vec<JournalContext>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            journals: HashMap::new(),
            contexts: Err(http_error("/index/api/v1/contexts", 403)),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn journal(mut self, path: &str, journal: FakeJournal) -> Self {
        self.journals.insert(path.to_string(), journal);
        self
    }

    pub fn contexts(mut self, contexts: Result<Vec<JournalContext>>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Recorded calls as `"{context}:{endpoint}"`
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    async fn record(&self, context: &str, endpoint: &str) -> Option<&FakeJournal> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("{context}:{endpoint}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.journals.get(context)
    }

    async fn respond<T: Clone>(
        &self,
        context: &str,
        endpoint: &str,
        pick: impl Fn(&FakeJournal) -> &Result<T> + Send,
    ) -> Result<T> {
        match self.record(context, endpoint).await {
            Some(journal) => pick(journal).clone(),
            None => Err(http_error(&format!("/{context}/{endpoint}"), 404)),
        }
    }
}

#[async_trait]
impl JournalApi for FakeApi {
    async fn publication_stats(
        &self,
        context: &str,
        _query: &PublicationStatsQuery,
    ) -> Result<PublicationStatsResponse> {
        self.respond(context, "publications", |j| &j.publications)
            .await
    }

    async fn timeline(
        &self,
        context: &str,
        kind: TimelineKind,
        _query: &TimelineQuery,
    ) -> Result<Vec<TimelinePoint>> {
        match kind {
            TimelineKind::Abstract => {
                self.respond(context, "abstract", |j| &j.abstract_timeline)
                    .await
            }
            TimelineKind::Galley => {
                self.respond(context, "galley", |j| &j.galley_timeline)
                    .await
            }
        }
    }

    async fn editorial_stats(
        &self,
        context: &str,
        _range: Option<&DateRange>,
    ) -> Result<Vec<StatEntry>> {
        self.respond(context, "editorial", |j| &j.editorial).await
    }

    async fn editorial_averages(&self, context: &str) -> Result<EditorialAverages> {
        self.respond(context, "averages", |j| &j.averages).await
    }

    async fn user_stats(
        &self,
        context: &str,
        _status: Option<UserStatus>,
    ) -> Result<Vec<StatEntry>> {
        self.respond(context, "users", |j| &j.users).await
    }

    async fn contexts(&self) -> Result<Vec<JournalContext>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push("index:contexts".to_string());
        self.contexts.clone()
    }
}

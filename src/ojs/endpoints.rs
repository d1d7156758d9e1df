//! Typed access to the statistics endpoints.
//!
//! [`JournalApi`] is the seam between the metrics pipeline and the network:
//! [`OjsClient`] implements it over HTTP, tests implement it in memory.

use async_trait::async_trait;
use tracing::debug;

use super::client::{OjsClient, QueryParams};
use super::date_range::DateRange;
use super::types::{
    ContextsResponse, EditorialAverages, JournalContext, PublicationStatsResponse, StatEntry,
    TimelinePoint,
};
use crate::error::Result;

/// Sort direction of the publication statistics listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Parameters of `GET /stats/publications`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationStatsQuery {
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub range: Option<DateRange>,
    pub order_direction: Option<OrderDirection>,
    pub search_phrase: Option<String>,
}

impl PublicationStatsQuery {
    /// Single-item page: enough to read `itemsMax` and the top row.
    pub fn count_only() -> Self {
        Self {
            count: Some(1),
            order_direction: Some(OrderDirection::Desc),
            ..Self::default()
        }
    }

    pub fn params(&self) -> QueryParams {
        let mut params = Vec::new();
        if let Some(range) = &self.range {
            params.extend(range.params());
        }
        if let Some(count) = self.count {
            params.push(("count", count.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(direction) = self.order_direction {
            params.push(("orderDirection", direction.as_str().to_string()));
        }
        if let Some(phrase) = self.search_phrase.as_deref().filter(|p| !p.is_empty()) {
            params.push(("searchPhrase", phrase.to_string()));
        }
        params
    }
}

/// Which view timeline to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    Abstract,
    Galley,
}

impl TimelineKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Abstract => "/stats/publications/abstract",
            Self::Galley => "/stats/publications/galley",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Abstract => "abstract timeline",
            Self::Galley => "galley timeline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineInterval {
    Day,
    Month,
}

impl TimelineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

/// Parameters of the timeline endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineQuery {
    pub range: Option<DateRange>,
    pub interval: Option<TimelineInterval>,
}

impl TimelineQuery {
    pub fn monthly(range: DateRange) -> Self {
        Self {
            range: Some(range),
            interval: Some(TimelineInterval::Month),
        }
    }

    pub fn params(&self) -> QueryParams {
        let mut params = Vec::new();
        if let Some(range) = &self.range {
            params.extend(range.params());
        }
        if let Some(interval) = self.interval {
            params.push(("timelineInterval", interval.as_str().to_string()));
        }
        params
    }
}

/// Filter for `GET /stats/users`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

/// Read-only access to the journal statistics API
#[async_trait]
pub trait JournalApi: Send + Sync {
    /// Per-publication view counts
    async fn publication_stats(
        &self,
        context: &str,
        query: &PublicationStatsQuery,
    ) -> Result<PublicationStatsResponse>;

    /// Abstract or galley views per interval
    async fn timeline(
        &self,
        context: &str,
        kind: TimelineKind,
        query: &TimelineQuery,
    ) -> Result<Vec<TimelinePoint>>;

    /// Editorial workflow statistics
    async fn editorial_stats(
        &self,
        context: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<StatEntry>>;

    /// Yearly editorial averages
    async fn editorial_averages(&self, context: &str) -> Result<EditorialAverages>;

    /// User counts per role
    async fn user_stats(&self, context: &str, status: Option<UserStatus>)
    -> Result<Vec<StatEntry>>;

    /// All journals on the site (site-level endpoint, often admin-only)
    async fn contexts(&self) -> Result<Vec<JournalContext>>;
}

#[async_trait]
impl JournalApi for OjsClient {
    async fn publication_stats(
        &self,
        context: &str,
        query: &PublicationStatsQuery,
    ) -> Result<PublicationStatsResponse> {
        let url = self.config().api_url(context, "/stats/publications");
        let response: PublicationStatsResponse = self
            .get_json(url, query.params(), self.publication_timeout())
            .await?;
        debug!(
            "[ojs] {} publication stats: itemsMax={}, items={}",
            context,
            response.items_max,
            response.items.len()
        );
        Ok(response)
    }

    async fn timeline(
        &self,
        context: &str,
        kind: TimelineKind,
        query: &TimelineQuery,
    ) -> Result<Vec<TimelinePoint>> {
        let url = self.config().api_url(context, kind.endpoint());
        self.get_json(url, query.params(), self.default_timeout())
            .await
    }

    async fn editorial_stats(
        &self,
        context: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<StatEntry>> {
        let url = self.config().api_url(context, "/stats/editorial");
        let params = range.map(|r| r.params().to_vec()).unwrap_or_default();
        self.get_json(url, params, self.default_timeout()).await
    }

    async fn editorial_averages(&self, context: &str) -> Result<EditorialAverages> {
        let url = self.config().api_url(context, "/stats/editorial/averages");
        self.get_json(url, Vec::new(), self.default_timeout()).await
    }

    async fn user_stats(
        &self,
        context: &str,
        status: Option<UserStatus>,
    ) -> Result<Vec<StatEntry>> {
        let url = self.config().api_url(context, "/stats/users");
        let params = status
            .map(|s| vec![("status", s.as_str().to_string())])
            .unwrap_or_default();
        self.get_json(url, params, self.default_timeout()).await
    }

    async fn contexts(&self) -> Result<Vec<JournalContext>> {
        let url = self.config().contexts_url();
        let response: ContextsResponse = self
            .get_json(url, Vec::new(), self.default_timeout())
            .await?;
        Ok(response.items)
    }
}

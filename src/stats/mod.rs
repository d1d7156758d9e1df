//! Journal metrics pipeline
//!
//! # Architecture
//!
//! ```text
//! discovery ──► fetcher (×N, concurrent) ──► aggregate ──► cache ──► consumers
//!                   │
//!                   └── JournalApi (ojs::OjsClient over HTTP)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let service = MetricsService::from_config(&config);
//!
//! // Wait for the all-journals snapshot
//! let snapshot = service.dashboard(None).await?;
//!
//! // Or read without blocking, e.g. from a request handler
//! let state = service.read_dashboard(Some("tjpsd"));
//! ```

pub mod aggregate;
mod cache;
mod discovery;
mod fetcher;
mod models;
mod service;

pub use aggregate::{ALL_CONTEXTS, Aggregator, selected_path};
pub use cache::{Loader, QueryCache, QueryState, RefreshPolicy};
pub use discovery::{configured_contexts, default_contexts, discover_contexts};
pub use fetcher::{MetricsFetcher, RECENT_ACTIVITY_CAP, RawContextStats, TOP_PUBLICATIONS_CAP};
pub use models::{
    ActivityItem, ActivityType, AggregatedDashboardMetrics, DashboardMetrics, PublicationKey,
    TopPublication, rate_to_percent,
};
pub use service::{DashboardKey, MetricsService};

//! OJS REST API adapter
//!
//! Wire types, query building and the HTTP client for the journal statistics
//! endpoints. Everything above this module talks to [`JournalApi`] only.

mod client;
mod connection;
mod date_range;
mod endpoints;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{OjsClient, QueryParams};
pub use connection::{ConnectionReport, check_connection};
pub use date_range::DateRange;
pub use endpoints::{
    JournalApi, OrderDirection, PublicationStatsQuery, TimelineInterval, TimelineKind,
    TimelineQuery, UserStatus,
};
pub use types::{
    ContextsResponse, EditorialAverages, JournalContext, LocalizedString, PublicationStat,
    PublicationStatsResponse, PublicationSummary, StatEntry, TimelinePoint, resolve_localized,
    stat_value,
};

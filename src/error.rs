//! Error taxonomy for the metrics pipeline
//!
//! Every failure that can cross a component boundary is one of these variants.
//! The type is `Clone` so a single failed refresh can be handed to every caller
//! that was waiting on the same in-flight request.

/// Errors raised while fetching or aggregating journal metrics
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("Request timeout after {timeout_ms}ms - OJS server took too long to respond ({url})")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Expected JSON but got {content_type} from {url}. Response: {excerpt}")]
    UnexpectedContentType {
        url: String,
        content_type: String,
        excerpt: String,
    },

    #[error("Failed to parse JSON response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Network failure for {url}: {message}")]
    Network { url: String, message: String },

    #[error("No enabled journals found")]
    NoEnabledJournals,

    #[error("'{path}' is not an enabled journal")]
    UnknownJournal { path: String },

    #[error("All {attempted} journals failed to load")]
    AllContextsFailed { attempted: usize },
}

impl MetricsError {
    /// HTTP status code, when the upstream answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T, E = MetricsError> = std::result::Result<T, E>;

/// Truncate a response body for error messages and logs.
pub(crate) fn excerpt(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

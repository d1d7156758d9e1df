//! HTTP client for the OJS REST API.
//!
//! All requests go through [`OjsClient::get_json`], which is the single place
//! where transport failures are classified into [`MetricsError`] variants.
//! `ureq` is blocking, so each call runs on the tokio blocking pool; callers
//! can join any number of requests concurrently.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{MetricsError, Result, excerpt};

/// Query parameters as sent on the wire
pub type QueryParams = Vec<(&'static str, String)>;

/// Body excerpt attached to errors
const ERROR_EXCERPT_CHARS: usize = 200;
/// Body excerpt written to logs
const LOG_EXCERPT_CHARS: usize = 500;

/// Authenticated client for one OJS installation
#[derive(Clone)]
pub struct OjsClient {
    config: Config,
    agent: ureq::Agent,
}

impl OjsClient {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .user_agent(concat!("ojs-metrics/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            config: config.clone(),
            agent,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Timeout for everything except the publication statistics call
    pub fn default_timeout(&self) -> Duration {
        self.config.request.timeout()
    }

    pub fn publication_timeout(&self) -> Duration {
        self.config.request.publication_timeout()
    }

    /// GET `url` and decode the JSON body into `T`.
    pub async fn get_json<T>(&self, url: String, query: QueryParams, timeout: Duration) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let token = self.config.api_token().map(str::to_string);
        let task_url = url.clone();

        let body = tokio::task::spawn_blocking(move || {
            execute(&agent, &task_url, &query, token.as_deref(), timeout)
        })
        .await
        .map_err(|e| MetricsError::Network {
            url: url.clone(),
            message: format!("request task failed: {e}"),
        })??;

        serde_json::from_str(&body).map_err(|e| {
            error!(
                "[ojs] Invalid JSON from {}: {} ({})",
                url,
                e,
                excerpt(&body, LOG_EXCERPT_CHARS)
            );
            MetricsError::Decode {
                url,
                message: e.to_string(),
            }
        })
    }
}

fn with_auth(mut req: ureq::Request, token: Option<&str>) -> ureq::Request {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        req = req.set("Authorization", &format!("Bearer {token}"));
    }
    req
}

/// Perform one blocking GET and return the raw JSON body.
fn execute(
    agent: &ureq::Agent,
    url: &str,
    query: &[(&'static str, String)],
    token: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let mut req = agent
        .get(url)
        .timeout(timeout)
        .set("Accept", "application/json");
    for (name, value) in query {
        req = req.query(name, value);
    }
    let req = with_auth(req, token);

    let response = req.call().map_err(|e| classify(url, timeout, e))?;
    let status = response.status();
    let content_type = response.content_type().to_string();

    let body = response.into_string().map_err(|e| {
        if is_timeout_io(&e) {
            timeout_error(url, timeout)
        } else {
            MetricsError::Network {
                url: url.to_string(),
                message: format!("Failed to read response body: {e}"),
            }
        }
    })?;

    if !content_type.contains("json") {
        error!(
            "[ojs] Non-JSON response from {} ({}): {}",
            url,
            content_type,
            excerpt(&body, LOG_EXCERPT_CHARS)
        );
        return Err(MetricsError::UnexpectedContentType {
            url: url.to_string(),
            content_type,
            excerpt: excerpt(&body, ERROR_EXCERPT_CHARS),
        });
    }

    debug!(url, status, bytes = body.len(), "[ojs] Request succeeded");
    Ok(body)
}

fn classify(url: &str, timeout: Duration, err: ureq::Error) -> MetricsError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            warn!(
                "[ojs] HTTP {} from {}: {}",
                status,
                url,
                excerpt(&body, LOG_EXCERPT_CHARS)
            );
            MetricsError::Http {
                url: url.to_string(),
                status,
                body: excerpt(&body, ERROR_EXCERPT_CHARS),
            }
        }
        ureq::Error::Transport(transport) => {
            if is_timeout_transport(&transport) {
                warn!("[ojs] {} timed out after {:?}", url, timeout);
                timeout_error(url, timeout)
            } else {
                warn!("[ojs] Transport error for {}: {}", url, transport);
                MetricsError::Network {
                    url: url.to_string(),
                    message: transport.to_string(),
                }
            }
        }
    }
}

fn timeout_error(url: &str, timeout: Duration) -> MetricsError {
    MetricsError::Timeout {
        url: url.to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

fn is_timeout_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn is_timeout_transport(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_timeout_io(io) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

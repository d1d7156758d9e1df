//! Local HTTP server exposing cached dashboard snapshots
//!
//! Listens on localhost and answers:
//! - GET /health - liveness
//! - GET /contexts - enabled journals
//! - GET /metrics - snapshot across all journals
//! - GET /metrics/{path} - snapshot of one journal (404 unless enabled)
//!
//! Every response is a non-blocking cache read; stale or missing snapshots
//! are reloaded in the background.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tiny_http::{Response, Server};
use tracing::{debug, info};

use crate::stats::{MetricsService, QueryState};

/// Handle of a running snapshot server
pub struct SnapshotServer {
    addr: SocketAddr,
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
}

impl SnapshotServer {
    /// Bind `127.0.0.1:{port}` (0 picks a free port) and serve from a
    /// background thread.
    pub fn start(service: MetricsService, port: u16) -> Result<Self> {
        let bind_addr = format!("127.0.0.1:{}", port);
        let server = Server::http(&bind_addr)
            .map_err(|e| anyhow!("Failed to start server on {}: {}", bind_addr, e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("Server on {} is not bound to an IP address", bind_addr))?;
        info!("[ojs-metrics:http] Server listening on http://{}", addr);

        let server = Arc::new(server);
        let worker = Arc::clone(&server);
        let thread = thread::spawn(move || {
            for request in worker.incoming_requests() {
                handle_request(&service, request);
            }
            debug!("[ojs-metrics:http] Server stopped");
        });

        Ok(Self {
            addr,
            server,
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for the server thread.
    pub fn shutdown(mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn handle_request(service: &MetricsService, request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or(url.as_str());
    debug!("[ojs-metrics:http] {} {}", method, path);

    if method != "GET" {
        respond_json(
            request,
            405,
            serde_json::json!({ "error": "method_not_allowed" }),
        );
        return;
    }

    match path.trim_end_matches('/') {
        "/health" => respond_json(
            request,
            200,
            serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            }),
        ),
        "/contexts" => respond_state(request, &service.read_contexts()),
        "/metrics" => respond_dashboard(request, service, None),
        p if p.starts_with("/metrics/") => {
            let journal = &p["/metrics/".len()..];
            if journal.is_empty() || journal.contains('/') {
                respond_json(request, 404, serde_json::json!({ "error": "not_found" }));
                return;
            }
            // "/metrics/all" is the same snapshot as "/metrics"
            respond_dashboard(request, service, Some(journal));
        }
        _ => respond_json(request, 404, serde_json::json!({ "error": "not_found" })),
    }
}

fn respond_dashboard(
    request: tiny_http::Request,
    service: &MetricsService,
    journal: Option<&str>,
) {
    match service.read_dashboard(journal) {
        Some(state) => respond_state(request, &state),
        None => respond_json(
            request,
            404,
            serde_json::json!({ "error": "unknown_journal", "journal": journal }),
        ),
    }
}

/// Cache state as sent to clients
#[derive(Serialize)]
struct StateBody<'a, T> {
    data: Option<&'a T>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    is_loading: bool,
    is_stale: bool,
    error: Option<String>,
}

fn state_status<T>(state: &QueryState<T>) -> u16 {
    match (&state.data, &state.error) {
        (Some(_), _) => 200,
        (None, Some(_)) if !state.is_fetching => 502,
        (None, _) => 202,
    }
}

fn respond_state<T: Serialize>(request: tiny_http::Request, state: &QueryState<T>) {
    let body = StateBody {
        data: state.data.as_deref(),
        updated_at: state.updated_at,
        is_loading: state.is_loading,
        is_stale: state.is_stale,
        error: state.error.as_ref().map(ToString::to_string),
    };
    let value = serde_json::to_value(&body)
        .unwrap_or_else(|e| serde_json::json!({ "error": "serialize", "details": e.to_string() }));
    respond_json(request, state_status(state), value);
}

fn json_content_type() -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok()
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: serde_json::Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let mut response = Response::from_string(body).with_status_code(status_code);
    if let Some(header) = json_content_type() {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;

    fn state(data: Option<u32>, error: bool, is_fetching: bool) -> QueryState<u32> {
        QueryState {
            data: data.map(Arc::new),
            updated_at: None,
            is_loading: data.is_none() && is_fetching,
            is_fetching,
            is_stale: false,
            error: error.then_some(MetricsError::NoEnabledJournals),
        }
    }

    #[test]
    fn test_state_status_codes() {
        assert_eq!(state_status(&state(Some(1), true, false)), 200);
        assert_eq!(state_status(&state(None, false, true)), 202);
        assert_eq!(state_status(&state(None, true, true)), 202);
        assert_eq!(state_status(&state(None, true, false)), 502);
    }
}

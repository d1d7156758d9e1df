//! Shared test utilities: an in-process mock of the OJS REST API

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ojs_metrics::config::Config;
use serde_json::{Value, json};
use tiny_http::{Header, Response, Server};

/// A canned response for one path
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: value.to_string(),
            delay: None,
        }
    }

    pub fn status(status: u16, value: Value) -> Self {
        Self {
            status,
            ..Self::json(value)
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn raw_json(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Self::json(Value::Null)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One request as received by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
}

type Routes = Arc<Mutex<HashMap<String, MockResponse>>>;

/// Mock OJS server on a random localhost port; unknown paths answer 404 JSON.
pub struct MockOjs {
    base_url: String,
    server: Arc<Server>,
    routes: Routes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    thread: Option<JoinHandle<()>>,
}

impl MockOjs {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("Failed to bind mock server"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("Mock server has no IP address");
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let worker = Arc::clone(&server);
        let worker_routes = Arc::clone(&routes);
        let worker_requests = Arc::clone(&requests);
        let thread = thread::spawn(move || {
            for request in worker.incoming_requests() {
                let routes = Arc::clone(&worker_routes);
                let requests = Arc::clone(&worker_requests);
                // Per-request threads so a delayed route does not block the others
                thread::spawn(move || handle(request, &routes, &requests));
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            server,
            routes,
            requests,
            thread: Some(thread),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Config pointing at this mock with a token set
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.base_url = self.base_url.clone();
        config.auth.api_key = "test-token".to_string();
        config.request.timeout_ms = 2_000;
        config.request.publication_timeout_ms = 2_000;
        config
    }

    /// Register `response` for an absolute path such as
    /// `/index.php/ter/api/v1/stats/publications`
    pub fn route(&self, path: &str, response: MockResponse) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
        self
    }

    /// Register a journal-level endpoint, e.g. `journal_route("ter", "/stats/editorial", ..)`
    pub fn journal_route(&self, context: &str, endpoint: &str, response: MockResponse) -> &Self {
        self.route(&format!("/index.php/{}/api/v1{}", context, endpoint), response)
    }

    /// Register every statistics endpoint of a journal with `abstract_views`
    /// on a single publication.
    pub fn journal(&self, context: &str, abstract_views: u64) -> &Self {
        self.journal_route(
            context,
            "/stats/publications",
            MockResponse::json(publications(&[(1, "A Study", abstract_views, 3)])),
        )
        .journal_route(
            context,
            "/stats/editorial",
            MockResponse::json(json!([
                { "key": "submissionsReceived", "value": 10 },
                { "key": "submissionsAccepted", "value": 4 },
                { "key": "acceptanceRate", "value": 0.4 },
                { "key": "daysToDecision", "value": 20 }
            ])),
        )
        .journal_route(
            context,
            "/stats/editorial/averages",
            MockResponse::json(json!({
                "submissionsReceivedPerYear": 12.0,
                "submissionsAcceptedPerYear": 5.0,
                "submissionsDeclinedPerYear": 7.0
            })),
        )
        .journal_route(
            context,
            "/stats/users",
            MockResponse::json(json!([
                { "key": "reader", "value": 100 },
                { "key": "author", "value": 20 }
            ])),
        )
        .journal_route(
            context,
            "/stats/publications/abstract",
            MockResponse::json(json!([{ "date": "2024-01", "value": abstract_views }])),
        )
        .journal_route(
            context,
            "/stats/publications/galley",
            MockResponse::json(json!([])),
        )
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path_suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(path_suffix))
            .collect()
    }
}

impl Drop for MockOjs {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// `GET /stats/publications` body from `(id, title, abstract_views, pdf_views)` rows
pub fn publications(rows: &[(u64, &str, u64, u64)]) -> Value {
    let items: Vec<Value> = rows
        .iter()
        .map(|(id, title, abstract_views, pdf_views)| {
            json!({
                "abstractViews": abstract_views,
                "galleyViews": pdf_views,
                "pdfViews": pdf_views,
                "htmlViews": 0,
                "otherViews": 0,
                "publication": {
                    "id": id,
                    "authorsStringShort": "Doe et al.",
                    "fullTitle": { "en_US": title }
                }
            })
        })
        .collect();
    json!({ "items": items, "itemsMax": rows.len() })
}

fn handle(
    request: tiny_http::Request,
    routes: &Mutex<HashMap<String, MockResponse>>,
    requests: &Mutex<Vec<RecordedRequest>>,
) {
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (url.clone(), String::new()),
    };
    let authorization = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_string());

    requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        query,
        authorization,
    });

    let response = routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or_else(|| {
            MockResponse::status(404, json!({ "error": "api.404.endpointNotFound" }))
        });

    if let Some(delay) = response.delay {
        thread::sleep(delay);
    }

    let header = Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes())
        .expect("Invalid content type header");
    let _ = request.respond(
        Response::from_string(response.body)
            .with_status_code(response.status)
            .with_header(header),
    );
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use web_scrape_assistant::api::routes::create_router;
use web_scrape_assistant::config::Config;
use web_scrape_assistant::crawl::{CrawlError, CrawlOptions, CrawlProvider, CrawlResult};
use web_scrape_assistant::AppState;

type Responder = Box<dyn Fn() -> Result<CrawlResult, CrawlError> + Send + Sync>;

/// Crawl provider that answers every call from a canned responder and
/// records what it was asked.
pub struct FakeProvider {
    responder: Responder,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, CrawlOptions)>>,
}

impl FakeProvider {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn() -> Result<CrawlResult, CrawlError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn returning(result: CrawlResult) -> Arc<Self> {
        Self::new(move || Ok(result.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, CrawlOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrawlProvider for FakeProvider {
    async fn crawl(&self, url: &str, options: CrawlOptions) -> Result<CrawlResult, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((url.to_string(), options));
        (self.responder)()
    }
}

pub fn config(pairs: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry("FIRECRAWL_API_KEY".to_string())
        .or_insert_with(|| "fc-test".to_string());
    Config::from_lookup(|key| map.get(key).cloned()).unwrap()
}

pub fn test_app(provider: Arc<FakeProvider>, config: Config) -> Router {
    create_router(AppState::new(config, provider))
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

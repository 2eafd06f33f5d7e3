use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::crawl::{CrawlError, CrawlOptions, CrawlProvider, CrawlResult};

// Job states that mean "poll again".
const IN_PROGRESS: &[&str] = &["scraping", "active", "pending", "queued", "waiting", "paused"];

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
}

#[derive(Deserialize)]
struct CrawlStarted {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for the Firecrawl v1 crawl API.
///
/// A crawl is an asynchronous job upstream: it is started once and then
/// polled until it reaches a terminal status.
pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    api_url: String,
    poll_interval: Duration,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    async fn start_crawl(&self, url: &str, options: CrawlOptions) -> Result<Value, CrawlError> {
        let body = CrawlRequest {
            url,
            limit: options.limit,
        };

        let res = self
            .client
            .post(format!("{}/v1/crawl", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        json_or_api_error(res, "start crawl job").await
    }

    async fn crawl_status(&self, status_url: &str) -> Result<Value, CrawlError> {
        let res = self
            .client
            .get(status_url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        json_or_api_error(res, "check crawl status").await
    }

    /// Polls the job until it completes, then gathers every page, following
    /// `next` links when the result is split across several responses.
    ///
    /// Only the known in-progress states keep the loop going. Any other
    /// state, a missing one included, ends the crawl.
    async fn wait_for_job(&self, id: &str) -> Result<CrawlResult, CrawlError> {
        let status_url = format!("{}/v1/crawl/{}", self.api_url, id);

        loop {
            let mut status = self.crawl_status(&status_url).await?;
            let state = status["status"].as_str().unwrap_or_default().to_string();

            match state.as_str() {
                "completed" => {
                    let mut pages = take_pages(&mut status);
                    let mut next = next_url(&status);
                    while let Some(url) = next {
                        debug!("Fetching next batch of crawl results from {}", url);
                        let mut batch = self.crawl_status(&url).await?;
                        pages.extend(take_pages(&mut batch));
                        next = next_url(&batch);
                    }
                    status["data"] = Value::Array(pages);
                    return CrawlResult::from_json(status);
                }
                state if IN_PROGRESS.contains(&state) => {
                    debug!(
                        "Crawl {} is {} ({}/{} pages)",
                        id,
                        state,
                        status["completed"].as_u64().unwrap_or(0),
                        status["total"].as_u64().unwrap_or(0)
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
                _ => {
                    warn!("Crawl {} stopped in state {:?}", id, state);
                    return match error_message(&status) {
                        Some(error) => Ok(CrawlResult::Failed(error)),
                        None => Err(CrawlError::JobFailed(state)),
                    };
                }
            }
        }
    }
}

#[async_trait]
impl CrawlProvider for FirecrawlClient {
    async fn crawl(&self, url: &str, options: CrawlOptions) -> Result<CrawlResult, CrawlError> {
        let started = self.start_crawl(url, options).await?;
        let job: CrawlStarted = serde_json::from_value(started.clone())
            .map_err(|e| CrawlError::InvalidResponse(e.to_string()))?;

        let id = match (job.success, job.id) {
            (Some(false), _) | (_, None) => {
                // Accepted at the HTTP level but refused in the body; hand the
                // body back as a result so its error field gets reported.
                return CrawlResult::from_json(started);
            }
            (_, Some(id)) => id,
        };

        info!("Started crawl job {} for {} (limit {})", id, url, options.limit);
        self.wait_for_job(&id).await
    }
}

async fn json_or_api_error(res: Response, action: &'static str) -> Result<Value, CrawlError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<Value>().await?);
    }

    let body: Value = res.json().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| "Unknown error".to_string());
    let details = body["details"].as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| serde_json::from_value::<ErrorDetail>(item.clone()).ok())
            .map(|detail| detail.message)
            .collect()
    });

    Err(CrawlError::Api {
        action,
        status: status.as_u16(),
        message,
        details,
    })
}

fn error_message(body: &Value) -> Option<String> {
    body["error"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn take_pages(status: &mut Value) -> Vec<Value> {
    match status.get_mut("data").map(Value::take) {
        Some(Value::Array(pages)) => pages,
        _ => Vec::new(),
    }
}

fn next_url(status: &Value) -> Option<String> {
    status["next"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::scraper::{validate_url, Document};

/// A validated scrape request: `url` is known to be an http(s) URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub url: String,
}

impl ScrapeRequest {
    /// Validates a decoded request body. Non-object bodies have no `url`.
    pub fn from_body(body: &Value) -> Result<Self> {
        let url = validate_url(body.get("url"))?;
        Ok(Self { url })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponse {
    pub url: String,
    pub content: String,
    pub word_count: usize,
    pub character_count: usize,
    pub scraped_at: DateTime<Utc>,
    pub success: bool,
}

impl ScrapeResponse {
    pub fn new(url: String, document: Document) -> Self {
        Self {
            url,
            content: document.content,
            word_count: document.word_count,
            character_count: document.character_count,
            scraped_at: document.scraped_at,
            success: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

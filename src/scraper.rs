use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::crawl::{CrawlOptions, CrawlProvider, CrawlResult};
use crate::error::{AppError, Result};

// Compiled once; matched against every inbound URL
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://.+").expect("Failed to compile URL pattern")
});

/// A crawl result flattened into one text document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub word_count: usize,
    pub character_count: usize,
    pub scraped_at: DateTime<Utc>,
}

/// Checks the `url` value of an inbound request.
///
/// Absent, null, empty, `false` and `0` all count as missing. Anything else
/// must be a string starting with `http://` or `https://` and carrying at
/// least one more character.
pub fn validate_url(raw: Option<&Value>) -> Result<String> {
    let url = match raw {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return Err(AppError::InvalidRequest),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => return Err(AppError::InvalidRequest),
        Some(Value::String(s)) if s.is_empty() => return Err(AppError::InvalidRequest),
        Some(Value::String(s)) => s,
        Some(_) => return Err(AppError::InvalidUrlFormat),
    };

    if !URL_PATTERN.is_match(url) {
        return Err(AppError::InvalidUrlFormat);
    }

    Ok(url.clone())
}

/// Concatenates a crawl result into a single untrimmed document.
///
/// Each page gets its own section under a heading naming its URL, in the
/// order the provider returned them. A page without any content still gets
/// its heading.
pub fn assemble(result: CrawlResult) -> Result<String> {
    match result {
        CrawlResult::Pages(pages) => {
            let mut document = String::new();
            for page in &pages {
                document.push_str("\n\n---\n\n# ");
                document.push_str(page.source_url());
                document.push_str("\n\n");
                document.push_str(page.content.body().unwrap_or_default());
            }
            Ok(document)
        }
        CrawlResult::Single(content) => Ok(content),
        CrawlResult::Failed(error) => Err(AppError::ProviderError(error)),
        CrawlResult::Empty => Ok(String::new()),
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

pub fn normalize(result: CrawlResult) -> Result<Document> {
    let assembled = assemble(result)?;
    let content = assembled.trim();
    if content.is_empty() {
        return Err(AppError::EmptyResult);
    }

    Ok(Document {
        content: content.to_string(),
        word_count: word_count(content),
        character_count: character_count(content),
        scraped_at: Utc::now(),
    })
}

/// Crawls `url` through the provider and normalizes what comes back.
///
/// Exactly one provider call is made; its failure is the request's failure.
pub async fn scrape(provider: &dyn CrawlProvider, url: &str, options: CrawlOptions) -> Result<Document> {
    info!("Scraping and crawling URL: {}", url);
    let start = std::time::Instant::now();

    let result = provider.crawl(url, options).await?;
    debug!("Crawl for {} returned after {:?}: {}", url, start.elapsed(), describe(&result));

    let document = normalize(result)?;
    info!(
        "Successfully scraped and crawled {} - {} words",
        url, document.word_count
    );
    Ok(document)
}

fn describe(result: &CrawlResult) -> String {
    match result {
        CrawlResult::Pages(pages) => format!("{} page(s)", pages.len()),
        CrawlResult::Single(content) => format!("single page, {} bytes", content.len()),
        CrawlResult::Failed(error) => format!("error field: {}", error),
        CrawlResult::Empty => "no content".to_string(),
    }
}

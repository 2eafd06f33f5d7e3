use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Options passed along with every crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Maximum number of pages (the start page plus discovered links).
    pub limit: u32,
}

/// A service that fetches a URL, and optionally pages linked from it, and
/// hands back the extracted content.
#[async_trait]
pub trait CrawlProvider: Send + Sync {
    async fn crawl(&self, url: &str, options: CrawlOptions) -> Result<CrawlResult, CrawlError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Failed to {action}. Status code: {status}. Error: {message}")]
    Api {
        action: &'static str,
        status: u16,
        message: String,
        details: Option<Vec<String>>,
    },

    #[error("Crawl job failed or was stopped. Status: {0}")]
    JobFailed(String),

    #[error("Firecrawl request timeout: {0}")]
    Timeout(String),

    #[error("Firecrawl network error: {0}")]
    Network(String),

    #[error("Firecrawl request failed: {0}")]
    Request(String),

    #[error("Invalid response from Firecrawl: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CrawlError::Timeout(err.to_string())
        } else if err.is_connect() {
            CrawlError::Network(err.to_string())
        } else if err.is_decode() {
            CrawlError::InvalidResponse(err.to_string())
        } else {
            CrawlError::Request(err.to_string())
        }
    }
}

/// Content fields a page (or a single-page result) may carry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl PageContent {
    /// First non-empty representation: markdown, then text, then html.
    pub fn body(&self) -> Option<&str> {
        [&self.markdown, &self.text, &self.html]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CrawledPage {
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub content: PageContent,
}

impl CrawledPage {
    /// The page's own URL, preferring the metadata copy.
    pub fn source_url(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.url.as_deref())
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref())
            .unwrap_or("")
    }
}

/// Provider output as it arrives on the wire. Every field is optional and
/// loosely typed; `CrawlResult` is the checked form.
#[derive(Debug, Default, Deserialize)]
pub struct RawCrawlResult {
    #[serde(default, deserialize_with = "lenient_pages")]
    pub data: Option<Vec<CrawledPage>>,
    #[serde(flatten)]
    pub content: PageContent,
    #[serde(default, deserialize_with = "lenient_message")]
    pub error: Option<String>,
}

/// The three shapes a provider answer can take, plus the degenerate case
/// where it carries none of them.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlResult {
    Pages(Vec<CrawledPage>),
    Single(String),
    Failed(String),
    Empty,
}

impl CrawlResult {
    pub fn from_json(value: Value) -> Result<Self, CrawlError> {
        serde_json::from_value::<RawCrawlResult>(value)
            .map(CrawlResult::from)
            .map_err(|e| CrawlError::InvalidResponse(e.to_string()))
    }
}

impl From<RawCrawlResult> for CrawlResult {
    fn from(raw: RawCrawlResult) -> Self {
        if let Some(pages) = raw.data.filter(|pages| !pages.is_empty()) {
            return CrawlResult::Pages(pages);
        }
        if let Some(body) = raw.content.body() {
            return CrawlResult::Single(body.to_string());
        }
        match raw.error {
            Some(error) if !error.is_empty() => CrawlResult::Failed(error),
            _ => CrawlResult::Empty,
        }
    }
}

// `data` only counts when it is an array; anything else is ignored. Entries
// that are not page objects still occupy a slot, as empty pages.
fn lenient_pages<'de, D>(deserializer: D) -> Result<Option<Vec<CrawledPage>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| lenient_page(&item))
                .collect(),
        ),
        _ => None,
    })
}

// A page with one mistyped field keeps whatever else it carries.
fn lenient_page(item: &Value) -> CrawledPage {
    match CrawledPage::deserialize(item) {
        Ok(page) => page,
        Err(e) => {
            if item.is_object() {
                warn!("Salvaging malformed crawl page: {}", e);
            }
            let string_at = |pointer: &str| item.pointer(pointer).and_then(Value::as_str).map(str::to_string);
            CrawledPage {
                metadata: string_at("/metadata/url").map(|url| PageMetadata { url: Some(url) }),
                url: string_at("/url"),
                content: PageContent {
                    markdown: string_at("/markdown"),
                    text: string_at("/text"),
                    html: string_at("/html"),
                },
            }
        }
    }
}

fn lenient_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_arrays_decode_in_provider_order() {
        let result = CrawlResult::from_json(json!({
            "success": true,
            "status": "completed",
            "data": [
                { "markdown": "# One", "metadata": { "url": "https://a.test/1", "title": "One" } },
                { "html": "<p>Two</p>", "url": "https://a.test/2" }
            ]
        }))
        .unwrap();

        let CrawlResult::Pages(pages) = result else {
            panic!("expected pages");
        };
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].source_url(), "https://a.test/1");
        assert_eq!(pages[0].content.body(), Some("# One"));
        assert_eq!(pages[1].source_url(), "https://a.test/2");
        assert_eq!(pages[1].content.body(), Some("<p>Two</p>"));
    }

    #[test]
    fn pages_take_precedence_over_direct_content_and_error() {
        let result = CrawlResult::from_json(json!({
            "data": [{ "text": "page" }],
            "markdown": "top level",
            "error": "ignored"
        }))
        .unwrap();
        assert!(matches!(result, CrawlResult::Pages(ref pages) if pages.len() == 1));
    }

    #[test]
    fn empty_page_array_falls_through_to_direct_content() {
        let result = CrawlResult::from_json(json!({ "data": [], "html": "<p>Hello</p>" })).unwrap();
        assert_eq!(result, CrawlResult::Single("<p>Hello</p>".to_string()));
    }

    #[test]
    fn body_priority_skips_empty_fields() {
        let content = PageContent {
            markdown: Some(String::new()),
            text: Some("plain".to_string()),
            html: Some("<b>markup</b>".to_string()),
        };
        assert_eq!(content.body(), Some("plain"));
        assert_eq!(PageContent::default().body(), None);
    }

    #[test]
    fn error_field_only_counts_without_content() {
        let result = CrawlResult::from_json(json!({ "success": false, "error": "quota exceeded" })).unwrap();
        assert_eq!(result, CrawlResult::Failed("quota exceeded".to_string()));

        let result = CrawlResult::from_json(json!({ "text": "body", "error": "quota exceeded" })).unwrap();
        assert_eq!(result, CrawlResult::Single("body".to_string()));
    }

    #[test]
    fn nothing_useful_is_empty() {
        assert_eq!(CrawlResult::from_json(json!({})).unwrap(), CrawlResult::Empty);
        assert_eq!(
            CrawlResult::from_json(json!({ "data": [], "error": "" })).unwrap(),
            CrawlResult::Empty
        );
        // A non-array `data` is not a page list.
        assert_eq!(
            CrawlResult::from_json(json!({ "data": { "markdown": "x" } })).unwrap(),
            CrawlResult::Empty
        );
    }

    #[test]
    fn metadata_url_falls_back_to_page_url() {
        let page: CrawledPage = serde_json::from_value(json!({
            "metadata": { "url": "" },
            "url": "https://fallback.test"
        }))
        .unwrap();
        assert_eq!(page.source_url(), "https://fallback.test");

        let page: CrawledPage = serde_json::from_value(json!({ "metadata": null })).unwrap();
        assert_eq!(page.source_url(), "");
    }

    #[test]
    fn non_object_pages_become_empty_pages() {
        let result = CrawlResult::from_json(json!({ "data": ["oops", { "text": "ok" }] })).unwrap();
        let CrawlResult::Pages(pages) = result else {
            panic!("expected pages");
        };
        assert_eq!(pages[0], CrawledPage::default());
        assert_eq!(pages[1].content.body(), Some("ok"));
    }

    #[test]
    fn mistyped_fields_do_not_drop_the_rest_of_a_page() {
        let result = CrawlResult::from_json(json!({
            "data": [
                { "markdown": "# Kept", "url": "https://a.test/1", "metadata": { "url": 123 } },
                { "markdown": 7, "text": "fallback text", "metadata": { "url": "https://a.test/2" } }
            ]
        }))
        .unwrap();
        let CrawlResult::Pages(pages) = result else {
            panic!("expected pages");
        };
        assert_eq!(pages[0].source_url(), "https://a.test/1");
        assert_eq!(pages[0].content.body(), Some("# Kept"));
        assert_eq!(pages[1].source_url(), "https://a.test/2");
        assert_eq!(pages[1].content.body(), Some("fallback text"));
    }

    #[test]
    fn non_object_result_is_invalid() {
        let err = CrawlResult::from_json(json!("not an object")).unwrap_err();
        assert!(matches!(err, CrawlError::InvalidResponse(_)));
    }
}

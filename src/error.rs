use axum::http::StatusCode;

use crate::crawl::CrawlError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("URL is required")]
    InvalidRequest,

    #[error("Invalid URL format")]
    InvalidUrlFormat,

    #[error("Firecrawl error: {0}")]
    ProviderError(String),

    #[error("No data received from Firecrawl")]
    EmptyResult,

    #[error(transparent)]
    CrawlError(#[from] CrawlError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Sub-error messages attached by the provider when it rejected the
    /// request itself (bad URL, bad options).
    pub fn sub_errors(&self) -> Option<&[String]> {
        match self {
            AppError::CrawlError(CrawlError::Api { details: Some(details), .. }) => Some(details),
            _ => None,
        }
    }
}

/// Buckets a failed scrape is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    UpstreamValidation(String),
    NotFound,
    Forbidden,
    Timeout,
    Network,
    Unclassified,
}

impl ErrorClass {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorClass::UpstreamValidation(_) => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Forbidden => StatusCode::FORBIDDEN,
            ErrorClass::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorClass::Network => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::UpstreamValidation(_) => "Invalid URL",
            ErrorClass::NotFound => "Page not found (404)",
            ErrorClass::Forbidden => "Access forbidden (403)",
            ErrorClass::Timeout => "Request timeout - the page took too long to load",
            ErrorClass::Network => "Network error - please check your internet connection",
            ErrorClass::Unclassified => "Failed to scrape the URL",
        }
    }
}

/// Maps a crawl or normalization failure onto a response bucket.
///
/// Structured sub-errors win outright; otherwise the message is searched
/// for known markers, first match wins.
pub fn classify(err: &AppError) -> ErrorClass {
    if let Some(details) = err.sub_errors() {
        return ErrorClass::UpstreamValidation(details.join("; "));
    }

    let message = err.to_string();
    if message.contains("404") {
        ErrorClass::NotFound
    } else if message.contains("403") {
        ErrorClass::Forbidden
    } else if message.contains("timeout") {
        ErrorClass::Timeout
    } else if message.contains("network") {
        ErrorClass::Network
    } else {
        ErrorClass::Unclassified
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, message: &str, details: Option<Vec<String>>) -> AppError {
        AppError::CrawlError(CrawlError::Api {
            action: "start crawl job",
            status,
            message: message.to_string(),
            details,
        })
    }

    #[test]
    fn status_codes_in_the_message_pick_the_bucket() {
        assert_eq!(classify(&api_error(404, "Not Found", None)), ErrorClass::NotFound);
        assert_eq!(classify(&api_error(403, "Forbidden", None)), ErrorClass::Forbidden);
        assert_eq!(
            classify(&AppError::ProviderError("upstream returned 404".to_string())),
            ErrorClass::NotFound
        );
    }

    #[test]
    fn first_match_wins() {
        // Mentions both 403 and 404; 404 is checked first.
        let err = AppError::ProviderError("403 after redirect to a 404 page".to_string());
        assert_eq!(classify(&err), ErrorClass::NotFound);

        let err = AppError::ProviderError("network timeout".to_string());
        assert_eq!(classify(&err), ErrorClass::Timeout);
    }

    #[test]
    fn transport_failures_land_in_their_buckets() {
        let timeout = AppError::CrawlError(CrawlError::Timeout("operation timed out".to_string()));
        assert_eq!(classify(&timeout), ErrorClass::Timeout);
        assert_eq!(classify(&timeout).status(), StatusCode::REQUEST_TIMEOUT);

        let network = AppError::CrawlError(CrawlError::Network("connection refused".to_string()));
        assert_eq!(classify(&network), ErrorClass::Network);
        assert_eq!(classify(&network).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let err = AppError::ProviderError("Timeout while rendering".to_string());
        assert_eq!(classify(&err), ErrorClass::Unclassified);
    }

    #[test]
    fn empty_result_is_unclassified() {
        let class = classify(&AppError::EmptyResult);
        assert_eq!(class, ErrorClass::Unclassified);
        assert_eq!(class.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(class.label(), "Failed to scrape the URL");
    }

    #[test]
    fn sub_errors_short_circuit_substring_matching() {
        // The status code alone would otherwise classify this as 404.
        let err = api_error(
            404,
            "Bad Request",
            Some(vec!["Invalid url".to_string(), "limit must be positive".to_string()]),
        );
        let class = classify(&err);
        assert_eq!(
            class,
            ErrorClass::UpstreamValidation("Invalid url; limit must be positive".to_string())
        );
        assert_eq!(class.status(), StatusCode::BAD_REQUEST);
        assert_eq!(class.label(), "Invalid URL");
    }
}

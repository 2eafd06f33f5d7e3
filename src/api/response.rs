use serde::{Deserialize, Serialize};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::config::Environment;
use crate::error::{classify, AppError, ErrorClass};

const RETRY_MESSAGE: &str = "Please try again with a different URL or check if the URL is accessible";

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(data))
}

pub fn error(
    status: StatusCode,
    error: impl Into<String>,
    message: impl Into<String>,
    details: Option<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            message: message.into(),
            details,
        }),
    )
}

pub fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    error(
        StatusCode::NOT_FOUND,
        "Endpoint not found",
        "The requested endpoint does not exist",
        None,
    )
}

pub fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        "Something went wrong on our end. Please try again later.",
        None,
    )
}

/// An `AppError` paired with the run mode that decides whether the raw
/// failure message is echoed back as `details`.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub environment: Environment,
}

impl ApiError {
    pub fn new(error: AppError, environment: Environment) -> Self {
        Self { error, environment }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError { error: err, environment } = self;

        match &err {
            AppError::InvalidRequest => {
                return error(StatusCode::BAD_REQUEST, "URL is required", "Please provide a valid URL to scrape", None)
                    .into_response();
            }
            AppError::InvalidUrlFormat => {
                return error(
                    StatusCode::BAD_REQUEST,
                    "Invalid URL format",
                    "Please provide a valid URL starting with http:// or https://",
                    None,
                )
                .into_response();
            }
            AppError::ConfigError(msg) | AppError::InternalError(msg) => {
                error!("Server error: {}", msg);
                return internal_error().into_response();
            }
            _ => {}
        }

        let details = environment.is_development().then(|| err.to_string());
        let class = classify(&err);
        let status = class.status();
        warn!("Scraping error ({}): {}", status, err);

        match class {
            ErrorClass::UpstreamValidation(message) => {
                error(status, "Invalid URL", message, details).into_response()
            }
            other => error(status, other.label(), RETRY_MESSAGE, details).into_response(),
        }
    }
}

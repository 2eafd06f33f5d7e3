use std::any::Any;
use std::collections::HashMap;

use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Form, FromRequest, Json, Request, State},
    http::{header::{HeaderName, CONTENT_TYPE}, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::models::{HealthResponse, ScrapeRequest, ScrapeResponse};
use crate::api::rate_limit::rate_limit;
use crate::api::response::{self, ApiError};
use crate::crawl::CrawlOptions;
use crate::error::AppError;
use crate::scraper;
use crate::AppState;

/// Largest request body accepted, in bytes.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

// Hardening headers added to every response that doesn't already set them.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;form-action 'self';\
         frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';\
         script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

pub fn create_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.cors_origin);

    let router = Router::new()
        .route("/api/health", get(health_handler).fallback(not_found_handler))
        .route("/api/scrape", post(scrape_handler).fallback(not_found_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::from_fn_with_state(app_state.clone(), rate_limit))
        .layer(cors);

    with_security_headers(router)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            warn!("Ignoring unusable CORS origin {:?}: {}", origin, e);
            cors
        }
    }
}

fn with_security_headers(mut router: Router<AppState>) -> Router<AppState> {
    for &(name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    router
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Server error: handler panicked: {}", detail);

    response::internal_error().into_response()
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthResponse {
        status: "OK".to_string(),
        message: "Web Scraping Assistant is running".to_string(),
    })
}

async fn not_found_handler() -> impl IntoResponse {
    response::not_found()
}

async fn scrape_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<ScrapeResponse>), ApiError> {
    let environment = state.config.environment;
    let fail = |err: AppError| ApiError::new(err, environment);

    let body = read_body(request, &state).await.map_err(fail)?;
    let req = ScrapeRequest::from_body(&body).map_err(fail)?;

    let start_time = std::time::Instant::now();
    let options = CrawlOptions {
        limit: state.config.crawl_page_limit,
    };
    let result = scraper::scrape(state.provider.as_ref(), &req.url, options).await;
    info!("Request processing for {} took {:?}", req.url, start_time.elapsed());

    let document = result.map_err(fail)?;
    Ok(response::success(ScrapeResponse::new(req.url, document)))
}

/// Reads a JSON or url-encoded form body into one loosely typed value.
/// Bodies of any other type are read as empty.
async fn read_body(request: Request, state: &AppState) -> Result<Value, AppError> {
    if is_form(&request) {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|rejection| AppError::InternalError(rejection.body_text()))?;
        let fields: Map<String, Value> = fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        return Ok(Value::Object(fields));
    }

    match Json::<Value>::from_request(request, state).await {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Null),
        Err(rejection) => Err(AppError::InternalError(rejection.body_text())),
    }
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

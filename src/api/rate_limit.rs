// Fixed-window rate limiting for everything under /api.
//
// Each client address gets a counter that resets when its window (15 minutes
// by default) runs out. Requests past the cap are answered with 429 and a
// fixed message before any handler runs.
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use crate::AppState;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request against a client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, ip: IpAddr) -> RateLimitStatus {
        self.check_at(ip, Instant::now())
    }

    /// Counts a hit for `ip` at `now`. Rejected hits still count.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitStatus {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = clients.entry(ip).or_insert(Window { started: now, hits: 0 });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, hits: 0 };
        }
        entry.hits = entry.hits.saturating_add(1);

        RateLimitStatus {
            allowed: entry.hits <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.hits),
            reset_after: self.window.saturating_sub(now.saturating_duration_since(entry.started)),
        }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Drops clients whose window has run out; returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Resolves the address a request is counted against.
///
/// With `trust_proxy` the first `X-Forwarded-For` entry wins; otherwise, and
/// as a fallback, the socket peer address. Requests with neither share one
/// bucket.
pub fn client_ip(request: &Request, trust_proxy: bool) -> IpAddr {
    let forwarded = trust_proxy
        .then(|| request.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn is_limited_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn set_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    let reset_secs = status.reset_after.as_secs() + u64::from(status.reset_after.subsec_nanos() > 0);
    let reset_at = Utc::now().timestamp().max(0) as u64 + reset_secs;

    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(status.limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(status.remaining));
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at));
    if !status.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_limited_path(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = client_ip(&request, state.config.trust_proxy);
    let status = state.limiter.check(ip);

    let mut response = if status.allowed {
        next.run(request).await
    } else {
        warn!("Rate limit exceeded for {} on {}", ip, request.uri().path());
        (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response()
    };

    set_headers(response.headers_mut(), &status);
    response
}

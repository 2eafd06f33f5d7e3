use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

const DEFAULT_FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";
const DEV_ORIGIN: &str = "http://localhost:3000";
const PROD_ORIGIN: &str = "https://yourdomain.com";

/// Controls how much failure detail reaches the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub firecrawl_api_key: String,
    pub firecrawl_api_url: String,
    pub environment: Environment,
    pub cors_origin: String,
    pub crawl_page_limit: u32,
    pub crawl_poll_interval: Duration,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub trust_proxy: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, so callers other than
    /// the process environment (tests, embedding) can supply values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let firecrawl_api_key = lookup("FIRECRAWL_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::ConfigError("FIRECRAWL_API_KEY is not set".to_string()))?;
        let firecrawl_api_url = lookup("FIRECRAWL_API_URL")
            .unwrap_or_else(|| DEFAULT_FIRECRAWL_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // Load server configuration with defaults
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "5000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;
        let server_addr = SocketAddr::new(ip, port);

        let environment = match lookup("APP_ENV").as_deref() {
            Some("development") => Environment::Development,
            _ => Environment::Production,
        };
        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| {
            match environment {
                Environment::Development => DEV_ORIGIN,
                Environment::Production => PROD_ORIGIN,
            }
            .to_string()
        });

        let crawl_page_limit = parse_or(&lookup, "CRAWL_PAGE_LIMIT", 5u32)?;
        let crawl_poll_interval = Duration::from_millis(parse_or(&lookup, "CRAWL_POLL_INTERVAL_MS", 2000u64)?);
        let rate_limit_max = parse_or(&lookup, "RATE_LIMIT_MAX", 100u32)?;
        let rate_limit_window = Duration::from_secs(parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 15 * 60u64)?);
        let trust_proxy = parse_or(&lookup, "TRUST_PROXY", false)?;

        if crawl_page_limit == 0 {
            return Err(AppError::ConfigError("CRAWL_PAGE_LIMIT must be at least 1".to_string()));
        }
        if rate_limit_window.is_zero() {
            return Err(AppError::ConfigError("RATE_LIMIT_WINDOW_SECS must be at least 1".to_string()));
        }

        Ok(Config {
            server_addr,
            firecrawl_api_key,
            firecrawl_api_url,
            environment,
            cors_origin,
            crawl_page_limit,
            crawl_poll_interval,
            rate_limit_max,
            rate_limit_window,
            trust_proxy,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

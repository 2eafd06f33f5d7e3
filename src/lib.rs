pub mod api;
pub mod config;
pub mod crawl;
pub mod error;
pub mod firecrawl;
pub mod scraper;

use std::sync::Arc;
use api::rate_limit::RateLimiter;
use config::Config;
use crawl::CrawlProvider;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn CrawlProvider>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn CrawlProvider>) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
        Self {
            config: Arc::new(config),
            provider,
            limiter: Arc::new(limiter),
        }
    }
}

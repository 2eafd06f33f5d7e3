use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_scrape_assistant::{
    config::Config,
    api::routes::create_router,
    firecrawl::FirecrawlClient,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,web_scrape_assistant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;
    tracing::info!("Configuration loaded ({:?} mode)", config.environment);

    // The crawl provider is built once and shared by every request
    let provider = FirecrawlClient::new(
        config.firecrawl_api_key.clone(),
        config.firecrawl_api_url.clone(),
        config.crawl_poll_interval,
    );
    let app_state = AppState::new(config, Arc::new(provider));

    // Forget clients whose rate-limit window has run out
    let limiter = app_state.limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!("Swept {} expired rate-limit windows", removed);
            }
        }
    });

    // Build the router with routes
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    tracing::info!("Web Scraping Assistant server running on {}", server_addr);
    tracing::info!("API available at http://{}/api", server_addr);
    tracing::info!("Health check: http://{}/api/health", server_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

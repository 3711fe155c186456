//! Awardgrid server shell.
//!
//! Thin layer that loads configuration, builds the browser pool and airline
//! producers, and serves the HTTP API. Core logic lives in the `crates/`
//! libraries.

pub mod error;
pub mod routes;
pub mod state;

use awardgrid_airline::{
    load_definitions, AirlineScraper, BritishAirwaysScraper, SimulatedScraper,
};
use awardgrid_browser::{ChromiumLauncher, ChromiumSettings, PagePool, PoolLimits};
use awardgrid_core::AppConfig;
use awardgrid_search::{OrchestratorSettings, RetryPolicy, SearchExecutor, SearchOrchestrator};
use state::{AppPage, AppState, SearchContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,awardgrid=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Build the pool and producers from configuration.
///
/// Failure here is fatal to the run: a service without a pool or producers
/// has nothing to serve.
pub async fn build_context(config: &AppConfig) -> anyhow::Result<Arc<SearchContext>> {
    let launcher = ChromiumLauncher::new(ChromiumSettings {
        headless: config.browser.headless,
        window_width: config.browser.window_width,
        window_height: config.browser.window_height,
    });
    let pool = PagePool::new(
        launcher,
        PoolLimits {
            max_browsers: config.pool.max_browsers,
            max_pages_per_browser: config.pool.max_pages_per_browser,
        },
    );
    pool.prewarm(config.pool.prewarm_pages).await?;
    info!(
        prewarmed = config.pool.prewarm_pages,
        "browser pool initialized"
    );

    let mut scrapers: Vec<Arc<dyn AirlineScraper<AppPage>>> = Vec::new();
    if config.airlines.enable_british_airways {
        match &config.airlines.definitions_dir {
            Some(dir) => {
                for definition in load_definitions(dir)? {
                    scrapers.push(Arc::new(BritishAirwaysScraper::from_definition(definition)?));
                }
            }
            None => scrapers.push(Arc::new(BritishAirwaysScraper::new())),
        }
    }
    for index in 1..=config.airlines.simulated_airlines {
        scrapers.push(Arc::new(SimulatedScraper::numbered(
            index,
            config.airlines.simulated_failure_rate,
        )));
    }
    anyhow::ensure!(!scrapers.is_empty(), "no airline producers configured");
    info!(count = scrapers.len(), "airline producers initialized");

    let executor = SearchExecutor::new(
        pool,
        RetryPolicy {
            max_attempts: config.search.max_attempts,
            base_delay: Duration::from_millis(config.search.base_delay_ms),
        },
    );
    let settings = OrchestratorSettings {
        sample_stride: config.search.sample_stride,
        run_deadline: (config.search.run_deadline_secs > 0)
            .then(|| Duration::from_secs(config.search.run_deadline_secs)),
    };

    Ok(Arc::new(SearchContext {
        orchestrator: SearchOrchestrator::new(executor, scrapers, settings),
    }))
}

/// Load config, initialize everything, and serve until ctrl-c.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting Awardgrid v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env()?;
    config.validate()?;

    let state = Arc::new(AppState::new());
    info!("Initializing browser automation...");
    let context = build_context(&config).await?;
    state.install(Arc::clone(&context));

    let app = routes::router(Arc::clone(&state));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Awardgrid server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully...");
    context.orchestrator.pool().shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}

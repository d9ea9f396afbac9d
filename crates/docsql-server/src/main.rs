//! docsql HTTP server
//!
//! Serves SQL over an in-memory search engine seeded from a JSON file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docsql_exec::Session;
use docsql_memory::{MemoryGateway, SeedError};
use tracing::info;

mod api;
mod config;
mod logging;
mod metrics;

use api::AppState;
use config::{Config, ConfigError, GatewayConfig};
use metrics::MetricsRegistry;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// `DOCSQL_CONFIG`, then `./config.yaml`, then defaults; env vars override all three.
fn load_config() -> Result<Config, ConfigError> {
    if let Ok(path) = std::env::var("DOCSQL_CONFIG") {
        return Config::load(path);
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        Config::load(default_path)
    } else {
        Config::from_env()
    }
}

fn build_gateway(config: &GatewayConfig) -> Result<MemoryGateway, SeedError> {
    let gateway = match &config.seed_path {
        Some(path) => MemoryGateway::load(path)?,
        None => MemoryGateway::new(),
    };
    Ok(match config.simulated_latency_ms {
        Some(ms) => gateway.with_latency(Duration::from_millis(ms)),
        None => gateway,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = load_config()?;
    logging::init(&config.logging)?;

    let gateway = build_gateway(&config.gateway)?;
    let collections = gateway.collection_names();
    let options = config.execution.options();
    let session = Session::new(Arc::new(gateway), options);
    let state = AppState::new(Arc::new(session), MetricsRegistry::new()?);
    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    crate::log_event!(
        level: tracing::Level::INFO,
        event: "server_started",
        addr: addr,
        collections: collections,
        timeout_secs: options.timeout.as_secs(),
        max_page_size: options.max_page_size,
    );
    info!("docsql server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! Weather-poetry HTTP server.
//!
//! Configuration comes from `WEATHER_POETRY_CONFIG` (optional YAML file) and
//! environment overrides; log level from `RUST_LOG` (default `info`).

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use weather_poetry::config::AppConfig;
use weather_poetry::server::Server;
use weather_poetry::service::{memory_cache, ServiceBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        ttl_secs = config.cache.ttl.as_secs(),
        sweep_secs = config.cache.sweep_interval.as_secs(),
        "starting weather-poetry"
    );
    if config.weather.api_key.is_none() {
        warn!("OPENWEATHERMAP_API_KEY is not set; weather routes will answer 500");
    }
    if config.generation.api_key.is_none() {
        warn!("GROQ_API_KEY is not set; /generate will answer 500");
    }

    let cache = memory_cache(config.cache.clone());
    let sweeper = cache.spawn_sweeper();
    let service = ServiceBuilder::from_config(&config, Arc::clone(&cache))
        .context("wiring upstream adapters")?
        .build()
        .context("building service")?;

    let server = Server::bind(config.server.bind_addr())
        .await
        .context("binding listener")?;
    server
        .run(Arc::new(service), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c, shutting down");
            }
        })
        .await?;

    sweeper.shutdown().await;
    let stats = cache.stats();
    cache.flush().await;
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_ratio = stats.hit_ratio(),
        "cache flushed, bye"
    );
    Ok(())
}

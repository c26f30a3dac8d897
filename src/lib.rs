//! # weather-poetry
//!
//! Backend for a weather-poetry web app: current weather, forecasts and city
//! suggestions from a weather provider, short generated poems about the
//! conditions, plus community comments and newsletter sign-up.
//!
//! ## Overview
//!
//! Upstream results are memoized in a TTL cache keyed by a stable hash of the
//! request parameters, so repeated lookups within the TTL never reach the
//! provider. Text generation runs through a bounded retry wrapper with a
//! per-attempt timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weather_poetry::config::AppConfig;
//! use weather_poetry::server::Server;
//! use weather_poetry::service::{memory_cache, ServiceBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let cache = memory_cache(config.cache.clone());
//!     let service = ServiceBuilder::from_config(&config, cache)?.build()?;
//!
//!     let server = Server::bind(config.server.bind_addr()).await?;
//!     server.run(Arc::new(service), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache store, key derivation and background sweep |
//! | [`resilience`] | Retry wrapper for upstream calls |
//! | [`upstream`] | Capability traits and their HTTP adapters |
//! | [`service`] | Request handlers composing cache, upstreams and retry |
//! | [`server`] | HTTP/1.1 boundary and route table |
//! | [`config`] | File and environment configuration |
//! | [`transport`] | Shared outbound HTTP client |
//! | [`types`] | Request and response payloads |

pub mod cache;
pub mod config;
pub mod resilience;
pub mod server;
pub mod service;
pub mod transport;
pub mod types;
pub mod upstream;

pub use cache::{CacheConfig, CacheKey, CacheKeyBuilder, CacheManager};
pub use config::AppConfig;
pub use resilience::{CallOutcome, RetryPolicy};
pub use service::{FallbackPolicy, OnFailure, ServiceBuilder, WeatherPoetryService};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind};

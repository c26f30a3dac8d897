//! # Response Caching Module
//!
//! Short-TTL caching of upstream responses, keyed by the request parameters
//! that determine each result.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Typed get/set, TTL, statistics, periodic sweep |
//! | [`CacheConfig`] | TTL, sweep interval and size limits |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`MemoryCache`] | In-process map with lazy expiry |
//! | [`NullCache`] | No-op backend for disabling caching |
//! | [`CacheKeyBuilder`] | Deterministic keys from typed parameter structs |
//!
//! ## Example
//!
//! ```rust
//! use weather_poetry::cache::{CacheConfig, CacheKeyBuilder, CacheManager, ForecastKey, MemoryCache};
//! use std::time::Duration;
//!
//! # #[tokio::main] async fn main() {
//! let cache = CacheManager::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(600)),
//!     Box::new(MemoryCache::new(1000)),
//! );
//! let key = CacheKeyBuilder::new().build(&ForecastKey::new("Stockholm"));
//! cache.set(&key, &vec!["Rain", "Clouds"]).await;
//! assert_eq!(cache.get::<Vec<String>>(&key).await.map(|v| v.len()), Some(2));
//! # }
//! ```
//!
//! ## Expiry
//!
//! An entry is valid while its age is below the TTL. Expired entries are
//! dropped when read and by a background sweep
//! ([`CacheManager::spawn_sweeper`]) running on a fixed interval.

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{CacheKey, CacheKeyBuilder, ForecastKey, KeyParams, PoetryKey, WeatherKey};
pub use manager::{CacheConfig, CacheManager, CacheStats, SweeperHandle};

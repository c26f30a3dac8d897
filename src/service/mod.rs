//! # Service Module
//!
//! The request handlers behind every inbound route, composed from the
//! injected cache, upstream capabilities and retry policy.
//!
//! Cacheable operations follow one policy: derive key → cache get → on a hit
//! return immediately → on a miss call upstream (through the retry wrapper
//! for text generation, a single attempt otherwise) → store on success →
//! return. Failures are never cached.

mod builder;
mod core;

use serde::{Deserialize, Serialize};

pub use self::builder::{memory_cache, ServiceBuilder};
pub use self::core::WeatherPoetryService;

/// What an operation answers when its upstream fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Propagate the error to the caller.
    Fail,
    /// Answer with an empty list instead.
    Empty,
}

/// Per-operation fallback choices for list-shaped results. Current weather
/// and poem generation always fail loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    pub forecast: OnFailure,
    pub geocode: OnFailure,
    pub comments: OnFailure,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            forecast: OnFailure::Fail,
            geocode: OnFailure::Empty,
            comments: OnFailure::Fail,
        }
    }
}

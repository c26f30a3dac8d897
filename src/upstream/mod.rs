//! Upstream capability interfaces and their HTTP adapters.
//!
//! The service only sees these traits, so the cache and retry composition can
//! be exercised against in-process doubles without any live provider.
//!
//! | Trait | Adapter |
//! |-------|---------|
//! | [`WeatherProvider`] | [`OpenWeatherMap`] |
//! | [`TextGenerator`] | [`ChatCompletionGenerator`] |
//! | [`CommentStore`] | [`MemoryCommentStore`], [`FirestoreCommentStore`] |
//! | [`NewsletterProvider`] | [`MailchimpNewsletter`] |

pub mod comments;
pub mod generation;
pub mod newsletter;
pub mod weather;

use async_trait::async_trait;

use crate::types::{Comment, CurrentWeather, ForecastDay, GeocodeQuery, Place, WeatherQuery};
use crate::Result;

pub use comments::{FirestoreCommentStore, MemoryCommentStore};
pub use generation::{ChatCompletionGenerator, Prompt};
pub use newsletter::MailchimpNewsletter;
pub use weather::OpenWeatherMap;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, query: &WeatherQuery) -> Result<CurrentWeather>;
    async fn forecast(&self, city: &str) -> Result<Vec<ForecastDay>>;
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Place>>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the generated text only, trimmed.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn append(&self, text: &str) -> Result<Comment>;
    /// Newest first, at most `limit`.
    async fn query_recent(&self, limit: usize) -> Result<Vec<Comment>>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait NewsletterProvider: Send + Sync {
    /// Idempotent: subscribing an existing address succeeds.
    async fn upsert_subscriber(&self, email: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{FallbackPolicy, OnFailure};
use crate::cache::{CacheKeyBuilder, CacheManager, ForecastKey};
use crate::resilience::RetryPolicy;
use crate::types::{
    Comment, CommentAck, CurrentWeather, ForecastDay, GeocodeQuery, Place, Poem, PoetryRequest,
    SubscribeAck, WeatherQuery,
};
use crate::upstream::{CommentStore, NewsletterProvider, Prompt, TextGenerator, WeatherProvider};
use crate::{Error, ErrorContext, Result};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("literal email pattern"));

/// Request handlers: validate input, derive the cache key, consult the
/// cache, call upstream on a miss, store successes.
///
/// Constructed once at startup via [`super::ServiceBuilder`] and shared
/// behind an `Arc` across all request tasks.
pub struct WeatherPoetryService {
    pub(super) cache: Arc<CacheManager>,
    pub(super) keys: CacheKeyBuilder,
    pub(super) weather: Arc<dyn WeatherProvider>,
    pub(super) generator: Arc<dyn TextGenerator>,
    pub(super) comments: Arc<dyn CommentStore>,
    pub(super) newsletter: Arc<dyn NewsletterProvider>,
    pub(super) retry: RetryPolicy,
    pub(super) fallback: FallbackPolicy,
    pub(super) comment_limit: usize,
    pub(super) comment_max_length: usize,
}

impl WeatherPoetryService {
    pub fn builder() -> super::ServiceBuilder {
        super::ServiceBuilder::new()
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Current conditions for a city or coordinates. Single upstream attempt.
    pub async fn current_weather(&self, query: WeatherQuery) -> Result<CurrentWeather> {
        if let WeatherQuery::City(ref city) = query {
            if city.trim().is_empty() {
                return Err(Error::missing_field("city"));
            }
        }
        let key = self.keys.build(&query.cache_params());
        self.cache
            .get_or_fetch(&key, || async {
                self.weather.current(&query).await.map_err(|e| {
                    warn!(provider = self.weather.name(), error = %e, "current weather lookup failed");
                    e
                })
            })
            .await
    }

    /// Daily forecast for a city. Single upstream attempt.
    pub async fn forecast(&self, city: &str) -> Result<Vec<ForecastDay>> {
        let city = city.trim();
        if city.is_empty() {
            return Err(Error::missing_field("city"));
        }
        let key = self.keys.build(&ForecastKey::new(city));
        let result = self
            .cache
            .get_or_fetch(&key, || async { self.weather.forecast(city).await })
            .await;
        self.apply_fallback("forecast", self.fallback.forecast, result)
    }

    /// City suggestions. Not cached.
    pub async fn geocode(&self, query: GeocodeQuery) -> Result<Vec<Place>> {
        if let GeocodeQuery::Text(ref text) = query {
            if text.trim().is_empty() {
                return Err(Error::missing_field("query"));
            }
        }
        let result = self.weather.geocode(&query).await;
        self.apply_fallback("geocode", self.fallback.geocode, result)
    }

    /// Generated poem, through the retry wrapper on a cache miss.
    pub async fn generate_poetry(&self, request: PoetryRequest) -> Result<Poem> {
        request.validate()?;
        let key = self.keys.build(&request.cache_params());
        if let Some(emotion) = self.cache.get::<String>(&key).await {
            debug!("serving cached poem");
            return Ok(Poem { emotion });
        }

        let prompt = Prompt::poetry(&request);
        let prompt = &prompt;
        let generator = &self.generator;
        let emotion = self
            .retry
            .call_with_retry("generate_poetry", move || generator.generate(prompt))
            .await?;

        self.cache.set(&key, &emotion).await;
        Ok(Poem { emotion })
    }

    /// Most recent comments, newest first.
    pub async fn list_comments(&self) -> Result<Vec<Comment>> {
        let result = self.comments.query_recent(self.comment_limit).await;
        self.apply_fallback("list_comments", self.fallback.comments, result)
    }

    pub async fn add_comment(&self, text: &str) -> Result<CommentAck> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::missing_field("comment"));
        }
        if text.chars().count() > self.comment_max_length {
            return Err(Error::validation_with_context(
                format!("comment is longer than {} characters", self.comment_max_length),
                ErrorContext::new()
                    .with_field_path("comment")
                    .with_source("input_validator"),
            ));
        }
        let comment = self.comments.append(text).await?;
        info!(id = %comment.id, store = self.comments.name(), "comment stored");
        Ok(CommentAck {
            id: comment.id,
            success: true,
        })
    }

    pub async fn subscribe(&self, email: &str) -> Result<SubscribeAck> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::missing_field("email"));
        }
        if !EMAIL.is_match(email) {
            return Err(Error::validation_with_context(
                "email address is not valid",
                ErrorContext::new()
                    .with_field_path("email")
                    .with_source("input_validator"),
            ));
        }
        self.newsletter.upsert_subscriber(email).await?;
        Ok(SubscribeAck {
            success: true,
            message: "Thank you for subscribing!".to_string(),
        })
    }

    fn apply_fallback<T: Default>(
        &self,
        operation: &'static str,
        policy: OnFailure,
        result: Result<T>,
    ) -> Result<T> {
        match (result, policy) {
            (Ok(value), _) => Ok(value),
            // bad input is the caller's problem regardless of policy
            (Err(e @ Error::Validation { .. }), _) => Err(e),
            // a missing key is an operator problem, never an empty answer
            (Err(e @ Error::Configuration { .. }), _) => Err(e),
            (Err(e), OnFailure::Empty) => {
                warn!(operation, error = %e, "upstream failed, answering with empty result");
                Ok(T::default())
            }
            (Err(e), OnFailure::Fail) => Err(e),
        }
    }
}

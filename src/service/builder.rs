use std::sync::Arc;

use super::{FallbackPolicy, WeatherPoetryService};
use crate::cache::{CacheKeyBuilder, CacheManager, MemoryCache, NullCache};
use crate::config::{AppConfig, CommentBackend};
use crate::resilience::RetryPolicy;
use crate::transport::HttpTransport;
use crate::upstream::{
    ChatCompletionGenerator, CommentStore, FirestoreCommentStore, MailchimpNewsletter,
    MemoryCommentStore, NewsletterProvider, OpenWeatherMap, TextGenerator, WeatherProvider,
};
use crate::{Error, ErrorContext, Result};

/// Builder for [`WeatherPoetryService`].
///
/// Every capability must be supplied; tests inject doubles, production code
/// goes through [`ServiceBuilder::from_config`].
pub struct ServiceBuilder {
    cache: Option<Arc<CacheManager>>,
    keys: CacheKeyBuilder,
    weather: Option<Arc<dyn WeatherProvider>>,
    generator: Option<Arc<dyn TextGenerator>>,
    comments: Option<Arc<dyn CommentStore>>,
    newsletter: Option<Arc<dyn NewsletterProvider>>,
    retry: RetryPolicy,
    fallback: FallbackPolicy,
    comment_limit: usize,
    comment_max_length: usize,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            cache: None,
            keys: CacheKeyBuilder::new(),
            weather: None,
            generator: None,
            comments: None,
            newsletter: None,
            retry: RetryPolicy::default(),
            fallback: FallbackPolicy::default(),
            comment_limit: 10,
            comment_max_length: 1000,
        }
    }

    /// Wire the real HTTP adapters described by `config` around `cache`.
    pub fn from_config(config: &AppConfig, cache: Arc<CacheManager>) -> Result<Self> {
        let transport = HttpTransport::new(&config.transport)?;

        let comments: Arc<dyn CommentStore> = match config.comments.backend {
            CommentBackend::Memory => Arc::new(MemoryCommentStore::default()),
            CommentBackend::Firestore => Arc::new(FirestoreCommentStore::new(
                transport.clone(),
                config.comments.clone(),
            )),
        };

        Ok(Self::new()
            .cache(cache)
            .weather(Arc::new(OpenWeatherMap::new(
                transport.clone(),
                config.weather.clone(),
            )))
            .generator(Arc::new(ChatCompletionGenerator::new(
                transport.clone(),
                config.generation.clone(),
            )))
            .comments(comments)
            .newsletter(Arc::new(MailchimpNewsletter::new(
                transport,
                config.newsletter.clone(),
            )))
            .retry(config.retry.clone())
            .fallback(config.fallback)
            .comment_limit(config.comments.recent_limit)
            .comment_max_length(config.comments.max_length))
    }

    pub fn cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn key_builder(mut self, keys: CacheKeyBuilder) -> Self {
        self.keys = keys;
        self
    }

    pub fn weather(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn comments(mut self, store: Arc<dyn CommentStore>) -> Self {
        self.comments = Some(store);
        self
    }

    pub fn newsletter(mut self, provider: Arc<dyn NewsletterProvider>) -> Self {
        self.newsletter = Some(provider);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }

    pub fn comment_limit(mut self, limit: usize) -> Self {
        self.comment_limit = limit.max(1);
        self
    }

    pub fn comment_max_length(mut self, max: usize) -> Self {
        self.comment_max_length = max.max(1);
        self
    }

    pub fn build(self) -> Result<WeatherPoetryService> {
        fn missing(what: &str) -> Error {
            Error::configuration_with_context(
                format!("service built without a {}", what),
                ErrorContext::new().with_source("service_builder"),
            )
        }
        Ok(WeatherPoetryService {
            // a service without an explicit cache still works, it just never hits
            cache: self.cache.unwrap_or_else(|| {
                Arc::new(CacheManager::new(
                    Default::default(),
                    Box::new(NullCache::new()),
                ))
            }),
            keys: self.keys,
            weather: self.weather.ok_or_else(|| missing("weather provider"))?,
            generator: self.generator.ok_or_else(|| missing("text generator"))?,
            comments: self.comments.ok_or_else(|| missing("comment store"))?,
            newsletter: self.newsletter.ok_or_else(|| missing("newsletter provider"))?,
            retry: self.retry,
            fallback: self.fallback,
            comment_limit: self.comment_limit,
            comment_max_length: self.comment_max_length,
        })
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The in-process cache every deployment starts with.
pub fn memory_cache(config: crate::cache::CacheConfig) -> Arc<CacheManager> {
    let capacity = config.max_entries;
    Arc::new(CacheManager::new(config, Box::new(MemoryCache::new(capacity))))
}

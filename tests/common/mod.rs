//! Shared fixtures: a mockito upstream and in-process capability doubles.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Server, ServerGuard};

use weather_poetry::config::{AppConfig, CommentBackend};
use weather_poetry::types::{Comment, CurrentWeather, ForecastDay, GeocodeQuery, Place, WeatherQuery};
use weather_poetry::upstream::{
    CommentStore, MemoryCommentStore, NewsletterProvider, Prompt, TextGenerator, WeatherProvider,
};
use weather_poetry::{Error, Result, RetryPolicy};

/// Mock upstream plus an [`AppConfig`] pointing every adapter at it.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.weather.api_key = Some("owm-test-key".into());
        config.weather.base_url = self.base_url.clone();
        config.generation.api_key = Some("gen-test-key".into());
        config.generation.base_url = self.base_url.clone();
        config.newsletter.api_key = Some("0123abcd-us21".into());
        config.newsletter.list_id = Some("list42".into());
        config.newsletter.base_url = Some(self.base_url.clone());
        config.comments.backend = CommentBackend::Firestore;
        config.comments.firestore_base_url = self.base_url.clone();
        config.comments.firebase_project_id = Some("vaderpoesi".into());
        config.retry = fast_retry();
        config
    }
}

/// Three attempts, short backoff so wall-clock tests stay quick.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(5), Duration::from_millis(20))
}

pub fn transient() -> Error {
    Error::Upstream {
        status: 503,
        message: "provider overloaded".into(),
        retryable: true,
    }
}

/// Weather double: fixed answers, counts calls, optionally fails.
#[derive(Default)]
pub struct CountingWeather {
    pub current_calls: AtomicUsize,
    pub forecast_calls: AtomicUsize,
    pub geocode_calls: AtomicUsize,
    pub failing: bool,
}

impl CountingWeather {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
            + self.forecast_calls.load(Ordering::SeqCst)
            + self.geocode_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for CountingWeather {
    async fn current(&self, query: &WeatherQuery) -> Result<CurrentWeather> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(transient());
        }
        let city = match query {
            WeatherQuery::City(city) => city.clone(),
            WeatherQuery::Coordinates { .. } => "Uppsala".to_string(),
        };
        Ok(CurrentWeather {
            weather: "Clouds".into(),
            temp: 7.5,
            city,
        })
    }

    async fn forecast(&self, _city: &str) -> Result<Vec<ForecastDay>> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(transient());
        }
        Ok(vec![ForecastDay {
            date: "2024-03-01".into(),
            weather: "Snow".into(),
            temp: -2,
        }])
    }

    async fn geocode(&self, _query: &GeocodeQuery) -> Result<Vec<Place>> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(transient());
        }
        Ok(vec![Place {
            name: "Stockholm".into(),
            lat: 59.3293,
            lon: 18.0686,
            country: Some("SE".into()),
            state: None,
        }])
    }

    fn name(&self) -> &'static str {
        "counting-weather"
    }
}

/// Generator double replaying a script of results, then repeating the last.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String>>>,
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn replay(result: &Result<String>) -> Result<String> {
    match result {
        Ok(text) => Ok(text.clone()),
        Err(Error::Validation { message, context }) => Err(Error::Validation {
            message: message.clone(),
            context: context.clone(),
        }),
        Err(_) => Err(transient()),
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            let next = script.pop_front().unwrap();
            return next;
        }
        replay(script.front().unwrap())
    }

    fn name(&self) -> &'static str {
        "scripted-generator"
    }
}

/// Comment store that always fails.
pub struct BrokenComments;

#[async_trait]
impl CommentStore for BrokenComments {
    async fn append(&self, _text: &str) -> Result<Comment> {
        Err(transient())
    }

    async fn query_recent(&self, _limit: usize) -> Result<Vec<Comment>> {
        Err(transient())
    }

    fn name(&self) -> &'static str {
        "broken-comments"
    }
}

#[derive(Default)]
pub struct RecordingNewsletter {
    pub subscribers: Mutex<Vec<String>>,
}

impl RecordingNewsletter {
    pub fn count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl NewsletterProvider for RecordingNewsletter {
    async fn upsert_subscriber(&self, email: &str) -> Result<()> {
        let mut subscribers = self.subscribers.lock().unwrap();
        if !subscribers.iter().any(|s| s == email) {
            subscribers.push(email.to_string());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording-newsletter"
    }
}

/// Handles to every double wired into a service.
pub struct Doubles {
    pub weather: Arc<CountingWeather>,
    pub generator: Arc<ScriptedGenerator>,
    pub comments: Arc<MemoryCommentStore>,
    pub newsletter: Arc<RecordingNewsletter>,
}

impl Doubles {
    pub fn new(weather: CountingWeather, generator: ScriptedGenerator) -> Self {
        Self {
            weather: Arc::new(weather),
            generator: Arc::new(generator),
            comments: Arc::new(MemoryCommentStore::new(100)),
            newsletter: Arc::new(RecordingNewsletter::default()),
        }
    }

    pub fn healthy() -> Self {
        Self::new(
            CountingWeather::default(),
            ScriptedGenerator::always("Molnen viskar om regn."),
        )
    }

    pub fn builder(&self) -> weather_poetry::ServiceBuilder {
        weather_poetry::ServiceBuilder::new()
            .weather(self.weather.clone())
            .generator(self.generator.clone())
            .comments(self.comments.clone())
            .newsletter(self.newsletter.clone())
            .retry(fast_retry())
    }
}

//! Service configuration.
//!
//! Settings come from an optional YAML file (path in `WEATHER_POETRY_CONFIG`),
//! then environment variables override individual knobs. Secrets are normally
//! supplied through the environment only.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::cache::CacheConfig;
use crate::resilience::RetryPolicy;
use crate::service::FallbackPolicy;
use crate::{Error, ErrorContext, Result};

/// Env var naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "WEATHER_POETRY_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub transport: TransportConfig,
    pub weather: WeatherConfig,
    pub generation: GenerationConfig,
    pub comments: CommentsConfig,
    pub newsletter: NewsletterConfig,
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound for every outbound call that has no tighter timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: String,
    pub geocode_limit: u32,
    pub forecast_entries: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org".into(),
            units: "metric".into(),
            geocode_limit: 5,
            forecast_entries: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-8b-instant".into(),
            max_tokens: 60,
            temperature: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentBackend {
    Memory,
    Firestore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub backend: CommentBackend,
    pub recent_limit: usize,
    pub max_length: usize,
    pub firestore_base_url: String,
    pub firebase_project_id: Option<String>,
    #[serde(skip_serializing)]
    pub firebase_api_key: Option<String>,
    pub collection: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            backend: CommentBackend::Memory,
            recent_limit: 10,
            max_length: 1000,
            firestore_base_url: "https://firestore.googleapis.com/v1".into(),
            firebase_project_id: None,
            firebase_api_key: None,
            collection: "comments".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsletterConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub list_id: Option<String>,
    /// Overrides the datacenter URL derived from the API key.
    pub base_url: Option<String>,
}

impl AppConfig {
    /// File (if `WEATHER_POETRY_CONFIG` is set) then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "cannot read config file",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                "invalid config file",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |name: &str| -> Result<Option<u64>> {
            match lookup(name) {
                Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
                    Error::configuration_with_context(
                        "expected a non-negative integer",
                        ErrorContext::new()
                            .with_field_path(name)
                            .with_source("config_loader"),
                    )
                }),
                None => Ok(None),
            }
        };

        if let Some(port) = parse_u64("PORT")? {
            self.server.port = u16::try_from(port).map_err(|_| {
                Error::configuration_with_context(
                    "port out of range",
                    ErrorContext::new().with_field_path("PORT"),
                )
            })?;
        }
        if let Some(secs) = parse_u64("CACHE_TTL_SECS")? {
            self.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64("CACHE_SWEEP_SECS")? {
            self.cache.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64("HTTP_TIMEOUT_SECS")? {
            self.transport.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_u64("RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = u32::try_from(n).map_err(|_| {
                Error::configuration_with_context(
                    "attempt count out of range",
                    ErrorContext::new().with_field_path("RETRY_MAX_ATTEMPTS"),
                )
            })?;
        }
        if let Some(secs) = parse_u64("RETRY_TIMEOUT_SECS")? {
            self.retry.timeout_per_attempt = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64("RETRY_BACKOFF_SECS")? {
            self.retry.backoff = Duration::from_secs(secs);
        }

        let set = |target: &mut Option<String>, name: &str| {
            if let Some(v) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *target = Some(v);
            }
        };
        set(&mut self.weather.api_key, "OPENWEATHERMAP_API_KEY");
        set(&mut self.generation.api_key, "GROQ_API_KEY");
        set(&mut self.newsletter.api_key, "MAILCHIMP_API_KEY");
        set(&mut self.newsletter.list_id, "MAILCHIMP_LIST_ID");
        set(&mut self.comments.firebase_api_key, "FIREBASE_API_KEY");
        set(&mut self.comments.firebase_project_id, "FIREBASE_PROJECT_ID");

        if let Some(url) = lookup("OPENWEATHERMAP_BASE_URL") {
            self.weather.base_url = url;
        }
        if let Some(url) = lookup("GENERATION_BASE_URL") {
            self.generation.base_url = url;
        }
        if let Some(model) = lookup("GENERATION_MODEL") {
            self.generation.model = model;
        }
        if self.comments.firebase_project_id.is_some() && lookup("COMMENTS_BACKEND").is_none() {
            self.comments.backend = CommentBackend::Firestore;
        }
        if let Some(backend) = lookup("COMMENTS_BACKEND") {
            self.comments.backend = match backend.trim() {
                "memory" => CommentBackend::Memory,
                "firestore" => CommentBackend::Firestore,
                _ => {
                    return Err(Error::configuration_with_context(
                        "expected 'memory' or 'firestore'",
                        ErrorContext::new().with_field_path("COMMENTS_BACKEND"),
                    ))
                }
            };
        }
        Ok(())
    }

    /// Structural checks. Missing API keys are not errors here: the affected
    /// operation reports them when called.
    pub fn validate(&self) -> Result<()> {
        let check_url = |field: &str, value: &str| -> Result<()> {
            Url::parse(value).map(|_| ()).map_err(|e| {
                Error::configuration_with_context(
                    "invalid URL",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_details(e.to_string())
                        .with_source("config_validator"),
                )
            })
        };
        check_url("weather.base_url", &self.weather.base_url)?;
        check_url("generation.base_url", &self.generation.base_url)?;
        check_url("comments.firestore_base_url", &self.comments.firestore_base_url)?;
        if let Some(ref url) = self.newsletter.base_url {
            check_url("newsletter.base_url", url)?;
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "must allow at least one attempt",
                ErrorContext::new().with_field_path("retry.max_attempts"),
            ));
        }
        if self.retry.timeout_per_attempt.is_zero() {
            return Err(Error::configuration_with_context(
                "per-attempt timeout must be positive",
                ErrorContext::new().with_field_path("retry.timeout_per_attempt"),
            ));
        }
        if self.cache.ttl.is_zero() {
            return Err(Error::configuration_with_context(
                "cache TTL must be positive",
                ErrorContext::new().with_field_path("cache.ttl"),
            ));
        }
        Ok(())
    }
}

/// Durations as (fractional) seconds in config files.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

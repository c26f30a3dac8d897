use serde::{Deserialize, Serialize};

use crate::cache::PoetryKey;
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_LANGUAGE: &str = "sv";

/// Inbound request for a weather poem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoetryRequest {
    pub weather: String,
    pub temp: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl PoetryRequest {
    pub fn new(weather: impl Into<String>, temp: f64) -> Self {
        Self {
            weather: weather.into(),
            temp,
            name: None,
            mood: None,
            language: None,
            city: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn language(&self) -> &str {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.weather.trim().is_empty() {
            return Err(Error::missing_field("weather"));
        }
        if !self.temp.is_finite() {
            return Err(Error::validation_with_context(
                "'temp' must be a finite number",
                ErrorContext::new()
                    .with_field_path("temp")
                    .with_source("input_validator"),
            ));
        }
        Ok(())
    }

    pub fn cache_params(&self) -> PoetryKey {
        PoetryKey {
            weather: self.weather.clone(),
            temperature: self.temp,
            name: self.name.clone(),
            mood: self.mood.clone(),
            language: self.language().to_string(),
            city: self.city.clone(),
        }
    }
}

/// Generated text as returned to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poem {
    pub emotion: String,
}

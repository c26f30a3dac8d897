//! Cache key derivation.
//!
//! Every cacheable operation has its own typed parameter struct. The builder
//! turns one into a [`CacheKey`] by hashing a canonical JSON form of an ordered
//! field map, so field values can contain any character without two distinct
//! requests ever producing the same key shape.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub namespace: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            namespace: None,
        }
    }
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Parameters that fully determine the result of one cacheable operation.
pub trait KeyParams {
    /// Namespace separating operations (`weather`, `forecast`, `poetry`).
    fn namespace(&self) -> &'static str;
    /// Every semantically significant field, normalized.
    fn fields(&self) -> BTreeMap<&'static str, String>;
}

/// Normalize a city identifier: trimmed and lowercased.
pub(crate) fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Missing optional parameters collapse to the empty placeholder.
fn normalize_optional(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Fixed-point text with negative zero folded into zero.
fn fixed(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => text,
    }
}

/// Where a current-weather lookup points.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherKey {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl KeyParams for WeatherKey {
    fn namespace(&self) -> &'static str {
        "weather"
    }
    fn fields(&self) -> BTreeMap<&'static str, String> {
        let mut fields = BTreeMap::new();
        match self {
            WeatherKey::City(city) => {
                fields.insert("city", normalize_city(city));
            }
            // ~11 m resolution; GPS jitter below that hits the same entry
            WeatherKey::Coordinates { lat, lon } => {
                fields.insert("lat", fixed(*lat, 4));
                fields.insert("lon", fixed(*lon, 4));
            }
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastKey {
    pub city: String,
}

impl ForecastKey {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into() }
    }
}

impl KeyParams for ForecastKey {
    fn namespace(&self) -> &'static str {
        "forecast"
    }
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([("city", normalize_city(&self.city))])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoetryKey {
    pub weather: String,
    pub temperature: f64,
    pub name: Option<String>,
    pub mood: Option<String>,
    pub language: String,
    pub city: Option<String>,
}

impl KeyParams for PoetryKey {
    fn namespace(&self) -> &'static str {
        "poetry"
    }
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("weather", self.weather.trim().to_string()),
            ("temperature", fixed(self.temperature, 1)),
            ("name", normalize_optional(self.name.as_deref())),
            ("mood", normalize_optional(self.mood.as_deref())),
            ("language", self.language.trim().to_lowercase()),
            (
                "city",
                self.city.as_deref().map(normalize_city).unwrap_or_default(),
            ),
        ])
    }
}

pub struct CacheKeyBuilder {
    salt: Option<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self { salt: None }
    }

    /// Mixes a deployment-specific salt into every key, so two services
    /// sharing a backend never read each other's entries.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn build(&self, params: &impl KeyParams) -> CacheKey {
        let namespace = params.namespace();
        let mut parts: BTreeMap<&str, String> = params.fields();
        parts.insert("__ns", namespace.to_string());
        if let Some(ref s) = self.salt {
            parts.insert("__salt", s.clone());
        }
        // BTreeMap<&str, String> always serializes
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(format!("{}:{}", namespace, hash)).with_namespace(namespace)
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

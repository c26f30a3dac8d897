//! Weather, forecast and geocoding payloads, plus the validated queries that
//! produce them.

use serde::{Deserialize, Serialize};

use crate::cache::WeatherKey;
use crate::{Error, ErrorContext, Result};

/// Current conditions as returned to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Condition group, e.g. "Rain", "Clouds".
    pub weather: String,
    /// Degrees Celsius.
    pub temp: f64,
    /// Resolved city name (useful for coordinate lookups).
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub weather: String,
    /// Rounded degrees Celsius.
    pub temp: i64,
}

/// City suggestion from forward or reverse geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl WeatherQuery {
    /// Build from raw query parameters. A non-blank city wins over coordinates.
    pub fn from_params(city: Option<&str>, lat: Option<&str>, lon: Option<&str>) -> Result<Self> {
        if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(WeatherQuery::City(city.to_string()));
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => {
                let (lat, lon) = parse_coordinates(lat, lon)?;
                Ok(WeatherQuery::Coordinates { lat, lon })
            }
            _ => Err(Error::missing_field("city")),
        }
    }

    pub fn cache_params(&self) -> WeatherKey {
        match self {
            WeatherQuery::City(city) => WeatherKey::City(city.clone()),
            WeatherQuery::Coordinates { lat, lon } => WeatherKey::Coordinates {
                lat: *lat,
                lon: *lon,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeQuery {
    /// Forward lookup of partial city text (autocomplete).
    Text(String),
    Reverse { lat: f64, lon: f64 },
}

impl GeocodeQuery {
    pub fn from_params(query: Option<&str>, lat: Option<&str>, lon: Option<&str>) -> Result<Self> {
        if let Some(text) = query.map(str::trim).filter(|q| !q.is_empty()) {
            return Ok(GeocodeQuery::Text(text.to_string()));
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => {
                let (lat, lon) = parse_coordinates(lat, lon)?;
                Ok(GeocodeQuery::Reverse { lat, lon })
            }
            _ => Err(Error::validation_with_context(
                "either 'query' or both 'lat' and 'lon' are required",
                ErrorContext::new()
                    .with_field_path("query")
                    .with_source("input_validator"),
            )),
        }
    }
}

pub(crate) fn parse_coordinates(lat: &str, lon: &str) -> Result<(f64, f64)> {
    let parse = |field: &str, raw: &str, bound: f64| -> Result<f64> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.abs() <= bound)
            .ok_or_else(|| {
                Error::validation_with_context(
                    format!("'{}' must be a number within ±{}", field, bound),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("input_validator"),
                )
            })
    };
    Ok((parse("lat", lat, 90.0)?, parse("lon", lon, 180.0)?))
}

//! OpenWeatherMap adapter: current conditions, forecast, forward and reverse
//! geocoding.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::WeatherProvider;
use crate::config::WeatherConfig;
use crate::transport::HttpTransport;
use crate::types::{CurrentWeather, ForecastDay, GeocodeQuery, Place, WeatherQuery};
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "openweathermap";

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    weather: Vec<Condition>,
    main: MainBlock,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    weather: Vec<Condition>,
    main: MainBlock,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

pub struct OpenWeatherMap {
    transport: HttpTransport,
    config: WeatherConfig,
}

impl OpenWeatherMap {
    pub fn new(transport: HttpTransport, config: WeatherConfig) -> Self {
        Self { transport, config }
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "weather API key is not configured",
                ErrorContext::new()
                    .with_field_path("OPENWEATHERMAP_API_KEY")
                    .with_source(SOURCE),
            )
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let key = self.api_key()?;
        let request = self
            .transport
            .client()
            .get(self.url(path))
            .query(params)
            .query(&[("appid", key)]);
        self.transport.send_json(SOURCE, request).await
    }
}

fn summarize(response: CurrentResponse, fallback_city: Option<&str>) -> Result<CurrentWeather> {
    let weather = response
        .weather
        .into_iter()
        .next()
        .map(|c| c.main)
        .ok_or_else(|| Error::malformed_response(SOURCE, "no weather condition"))?;
    let city = if response.name.is_empty() {
        fallback_city.unwrap_or_default().to_string()
    } else {
        response.name
    };
    Ok(CurrentWeather {
        weather,
        temp: response.main.temp,
        city,
    })
}

/// One entry per calendar day (UTC), the reading nearest midday, first
/// `days` days in order.
fn daily_forecast(entries: Vec<ForecastEntry>, days: usize) -> Vec<ForecastDay> {
    let mut by_day: BTreeMap<NaiveDate, (u32, ForecastEntry)> = BTreeMap::new();
    for entry in entries {
        let Some(at) = DateTime::<Utc>::from_timestamp(entry.dt, 0) else {
            continue;
        };
        if entry.weather.is_empty() {
            continue;
        }
        let distance = at.hour().abs_diff(12);
        let date = at.date_naive();
        let closer = by_day
            .get(&date)
            .map_or(true, |(best, _)| distance < *best);
        if closer {
            by_day.insert(date, (distance, entry));
        }
    }
    by_day
        .into_iter()
        .take(days)
        .filter_map(|(date, (_, entry))| {
            let weather = entry.weather.into_iter().next()?.main;
            Some(ForecastDay {
                date: date.format("%Y-%m-%d").to_string(),
                weather,
                temp: entry.main.temp.round() as i64,
            })
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    async fn current(&self, query: &WeatherQuery) -> Result<CurrentWeather> {
        let units = self.config.units.clone();
        match query {
            WeatherQuery::City(city) => {
                let response: CurrentResponse = self
                    .get(
                        "/data/2.5/weather",
                        &[("q", city.clone()), ("units", units)],
                    )
                    .await?;
                summarize(response, Some(city))
            }
            WeatherQuery::Coordinates { lat, lon } => {
                let response: CurrentResponse = self
                    .get(
                        "/data/2.5/weather",
                        &[
                            ("lat", lat.to_string()),
                            ("lon", lon.to_string()),
                            ("units", units),
                        ],
                    )
                    .await?;
                summarize(response, None)
            }
        }
    }

    async fn forecast(&self, city: &str) -> Result<Vec<ForecastDay>> {
        let response: ForecastResponse = self
            .get(
                "/data/2.5/forecast",
                &[("q", city.to_string()), ("units", self.config.units.clone())],
            )
            .await?;
        let days = daily_forecast(response.list, self.config.forecast_entries);
        debug!(city, days = days.len(), "forecast summarized");
        Ok(days)
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Place>> {
        let limit = self.config.geocode_limit.to_string();
        match query {
            GeocodeQuery::Text(text) => {
                self.get("/geo/1.0/direct", &[("q", text.clone()), ("limit", limit)])
                    .await
            }
            GeocodeQuery::Reverse { lat, lon } => {
                self.get(
                    "/geo/1.0/reverse",
                    &[
                        ("lat", lat.to_string()),
                        ("lon", lon.to_string()),
                        ("limit", limit),
                    ],
                )
                .await
            }
        }
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}

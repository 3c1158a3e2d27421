//! Open-Meteo weather client.
//!
//! Two round trips per uncached lookup: the geocoding API resolves a place
//! name to coordinates, the forecast API returns daily aggregates for the
//! target date. Responses are cached for thirty minutes per place and day
//! so a batch run with many outdoor tasks at the same location hits the
//! network once.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::services::{WeatherReport, WeatherService};

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com";

const CACHE_TTL: StdDuration = StdDuration::from_secs(30 * 60);

/// Day-level outdoor suitability.
///
/// Unsuitable when the day dips below freezing, exceeds 37.8 C (100 F),
/// carries more than a 70% precipitation chance, or the WMO code reports
/// severe conditions (heavy rain or snow, freezing rain, thunderstorms).
fn suitable_for_outdoor(min_c: f64, max_c: f64, precipitation_chance: f64, code: u16) -> bool {
    const SEVERE: [u16; 9] = [65, 66, 67, 75, 82, 86, 95, 96, 99];
    min_c >= 0.0 && max_c <= 37.8 && precipitation_chance <= 0.7 && !SEVERE.contains(&code)
}

/// Condition label for a WMO weather interpretation code.
fn describe_code(code: u16) -> &'static str {
    match code {
        0 => "clear",
        1..=3 => "partly cloudy",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeHit>,
}

#[derive(Deserialize)]
struct GeocodeHit {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    daily: DailyForecast,
}

#[derive(Deserialize)]
struct DailyForecast {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    weather_code: Vec<u16>,
}

struct CachedReport {
    fetched: Instant,
    report: WeatherReport,
}

pub struct OpenMeteoWeather {
    client: Client,
    runtime: tokio::runtime::Runtime,
    forecast_url: String,
    geocode_url: String,
    cache: Mutex<HashMap<String, CachedReport>>,
}

impl OpenMeteoWeather {
    pub fn new(forecast_url: impl Into<String>, geocode_url: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            client: Client::new(),
            runtime,
            forecast_url: forecast_url.into(),
            geocode_url: geocode_url.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn geocode(&self, location: &str) -> Result<(f64, f64)> {
        let url = format!("{}/v1/search", self.geocode_url);
        let response: GeocodeResponse = self
            .runtime
            .block_on(async {
                self.client
                    .get(&url)
                    .query(&[("name", location), ("count", "1")])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            })
            .map_err(|err: reqwest::Error| service_err("geocoding request failed", err))?;

        let hit = response
            .results
            .first()
            .ok_or_else(|| CoreError::service("weather", format!("no geocoding match for {location:?}")))?;
        Ok((hit.latitude, hit.longitude))
    }

    fn fetch_report(&self, location: &str, at: DateTime<Utc>) -> Result<WeatherReport> {
        let (latitude, longitude) = self.geocode(location)?;
        let date = at.date_naive().to_string();

        let url = format!("{}/v1/forecast", self.forecast_url);
        let response: ForecastResponse = self
            .runtime
            .block_on(async {
                self.client
                    .get(&url)
                    .query(&[
                        ("latitude", latitude.to_string()),
                        ("longitude", longitude.to_string()),
                        (
                            "daily",
                            "temperature_2m_max,temperature_2m_min,precipitation_probability_max,weather_code"
                                .to_string(),
                        ),
                        ("timezone", "UTC".to_string()),
                        ("start_date", date.clone()),
                        ("end_date", date.clone()),
                    ])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            })
            .map_err(|err: reqwest::Error| service_err("forecast request failed", err))?;

        let daily = &response.daily;
        if daily.temperature_2m_max.is_empty() || daily.temperature_2m_min.is_empty() {
            return Err(CoreError::service("weather", "empty forecast response"));
        }
        let idx = daily.time.iter().position(|d| *d == date).unwrap_or(0);

        let max_c = daily.temperature_2m_max[idx];
        let min_c = daily.temperature_2m_min[idx];
        let chance = daily
            .precipitation_probability_max
            .get(idx)
            .copied()
            .flatten()
            .unwrap_or(0.0)
            / 100.0;
        let code = daily.weather_code.get(idx).copied().unwrap_or(0);

        Ok(WeatherReport {
            temperature_c: (max_c + min_c) / 2.0,
            condition: describe_code(code).to_string(),
            precipitation_chance: chance,
            suitable_for_outdoor: suitable_for_outdoor(min_c, max_c, chance, code),
        })
    }
}

impl WeatherService for OpenMeteoWeather {
    fn conditions(&self, location: &str, at: DateTime<Utc>) -> Result<WeatherReport> {
        let key = format!("{}|{}", location.to_ascii_lowercase(), at.date_naive());
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            if cached.fetched.elapsed() < CACHE_TTL {
                debug!(location, "weather cache hit");
                return Ok(cached.report.clone());
            }
        }

        let report = self.fetch_report(location, at)?;
        self.cache.lock().unwrap().insert(
            key,
            CachedReport {
                fetched: Instant::now(),
                report: report.clone(),
            },
        );
        Ok(report)
    }
}

fn service_err(message: &str, err: reqwest::Error) -> CoreError {
    CoreError::Service {
        service: "weather".to_string(),
        message: message.to_string(),
        source: Some(Box::new(err)),
    }
}

//! GraphHopper travel-time client.
//!
//! Estimates come in three tiers: routes touching a named place the app
//! knows a flat number for, real routed estimates when both endpoints
//! geocode, and a conservative thirty-minute default when the provider is
//! down. The engine treats every estimate as advisory padding, so
//! degrading beats erroring.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::services::{TravelEstimate, TravelMode, TravelTimeService};

pub const DEFAULT_BASE_URL: &str = "https://graphhopper.com/api/1";

const CACHE_TTL: StdDuration = StdDuration::from_secs(60 * 60);
const FALLBACK_MINUTES: u32 = 30;
const METERS_PER_MILE: f64 = 1609.34;

/// Flat estimate for a route touching a place the app names symbolically.
/// These tokens never geocode, so routing is skipped for the whole pair.
/// Checked in a fixed order, so a route between two named places resolves
/// the same way in both directions.
fn named_pair_minutes(origin: &str, destination: &str) -> Option<u32> {
    for (token, minutes) in [("current_location", 15), ("home", 20), ("work", 25)] {
        if origin == token || destination == token {
            return Some(minutes);
        }
    }
    None
}

/// GraphHopper routing profile for a travel mode. The hosted API has no
/// transit profile; car is the closest stand-in.
fn profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Driving | TravelMode::Transit => "car",
        TravelMode::Walking => "foot",
        TravelMode::Cycling => "bike",
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    hits: Vec<GeocodeHit>,
}

#[derive(Deserialize)]
struct GeocodeHit {
    point: GeoPoint,
}

#[derive(Deserialize)]
struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RouteResponse {
    paths: Vec<RoutePath>,
}

#[derive(Deserialize)]
struct RoutePath {
    /// Meters
    distance: f64,
    /// Milliseconds
    time: i64,
}

struct CachedEstimate {
    fetched: Instant,
    estimate: TravelEstimate,
}

pub struct GraphHopperTravel {
    client: Client,
    runtime: tokio::runtime::Runtime,
    base_url: String,
    api_key: Option<String>,
    cache: Mutex<HashMap<(String, String, TravelMode), CachedEstimate>>,
}

impl GraphHopperTravel {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            client: Client::new(),
            runtime,
            base_url: base_url.into(),
            api_key,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn geocode(&self, place: &str) -> Result<GeoPoint> {
        let url = format!("{}/geocode", self.base_url);
        let mut query = vec![("q", place.to_string()), ("limit", "1".to_string())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        let response: GeocodeResponse = self
            .runtime
            .block_on(async {
                self.client
                    .get(&url)
                    .query(&query)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            })
            .map_err(|err: reqwest::Error| service_err("geocoding request failed", err))?;

        response
            .hits
            .into_iter()
            .next()
            .map(|hit| hit.point)
            .ok_or_else(|| CoreError::service("travel", format!("no geocoding match for {place:?}")))
    }

    fn fetch_route(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<TravelEstimate> {
        let from = self.geocode(origin)?;
        let to = self.geocode(destination)?;

        let url = format!("{}/route", self.base_url);
        let mut query = vec![
            ("point", format!("{},{}", from.lat, from.lng)),
            ("point", format!("{},{}", to.lat, to.lng)),
            ("profile", profile(mode).to_string()),
            ("calc_points", "false".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        let response: RouteResponse = self
            .runtime
            .block_on(async {
                self.client
                    .get(&url)
                    .query(&query)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            })
            .map_err(|err: reqwest::Error| service_err("route request failed", err))?;

        let path = response
            .paths
            .first()
            .ok_or_else(|| CoreError::service("travel", "route response had no paths"))?;

        Ok(TravelEstimate {
            duration_minutes: minutes_ceil(path.time),
            distance_miles: path.distance / METERS_PER_MILE,
            mode,
        })
    }
}

impl TravelTimeService for GraphHopperTravel {
    fn estimate(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<TravelEstimate> {
        if let Some(minutes) = named_pair_minutes(origin, destination) {
            return Ok(TravelEstimate {
                duration_minutes: minutes,
                distance_miles: 0.0,
                mode,
            });
        }

        let key = (
            origin.to_ascii_lowercase(),
            destination.to_ascii_lowercase(),
            mode,
        );
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            if cached.fetched.elapsed() < CACHE_TTL {
                debug!(origin, destination, "travel cache hit");
                return Ok(cached.estimate.clone());
            }
        }

        match self.fetch_route(origin, destination, mode) {
            Ok(estimate) => {
                self.cache.lock().unwrap().insert(
                    key,
                    CachedEstimate {
                        fetched: Instant::now(),
                        estimate: estimate.clone(),
                    },
                );
                Ok(estimate)
            }
            Err(err) => {
                warn!(origin, destination, error = %err, "routing failed, using default estimate");
                Ok(TravelEstimate {
                    duration_minutes: FALLBACK_MINUTES,
                    distance_miles: 0.0,
                    mode,
                })
            }
        }
    }
}

/// Milliseconds to whole minutes, rounding partial minutes up.
fn minutes_ceil(ms: i64) -> u32 {
    ((ms.max(0) + 59_999) / 60_000) as u32
}

fn service_err(message: &str, err: reqwest::Error) -> CoreError {
    CoreError::Service {
        service: "travel".to_string(),
        message: message.to_string(),
        source: Some(Box::new(err)),
    }
}

//! Advisory external services.
//!
//! Weather and travel-time lookups inform placement decisions but never
//! gate them: the engine degrades gracefully when a provider is down.
//! Each trait has one production implementation plus test fakes in the
//! engine's test suite.

pub mod travel;
pub mod weather;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outdoor conditions near a location on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Representative temperature for the day, Celsius
    pub temperature_c: f64,
    /// Human-readable condition, e.g. "clear", "thunderstorm"
    pub condition: String,
    /// Probability of precipitation, 0.0 to 1.0
    pub precipitation_chance: f64,
    /// Verdict for outdoor, weather-dependent tasks
    pub suitable_for_outdoor: bool,
}

/// How the user gets from origin to destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
    Cycling,
    Transit,
}

impl Default for TravelMode {
    fn default() -> Self {
        TravelMode::Driving
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelEstimate {
    pub duration_minutes: u32,
    /// 0.0 when the provider gave no route geometry
    pub distance_miles: f64,
    pub mode: TravelMode,
}

/// Weather lookups for weather-dependent tasks.
pub trait WeatherService {
    /// Conditions at `location` on the day containing `at`.
    fn conditions(&self, location: &str, at: DateTime<Utc>) -> Result<WeatherReport>;
}

/// Travel-duration estimates between named places.
pub trait TravelTimeService {
    fn estimate(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<TravelEstimate>;
}

/// Sink for user-facing notifications (in-app records, not push).
pub trait NotificationService {
    fn notify(&self, user_id: &str, title: &str, body: &str) -> Result<()>;
}

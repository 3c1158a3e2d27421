//! Per-user scheduling preferences.
//!
//! Created lazily with defaults on first use (09:00-17:00, Mon-Fri, 15
//! minute buffer, everything enabled, UTC). The timezone is stored as an
//! IANA name so day boundaries follow the user's wall clock rather than
//! wherever the process happens to run.

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ValidationError};

/// Scheduling preferences, one row per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulingPreferences {
    pub user_id: String,
    /// Work-day start time of day
    #[serde(default = "default_start_time")]
    pub preferred_start_time: NaiveTime,
    /// Work-day end time of day
    #[serde(default = "default_end_time")]
    pub preferred_end_time: NaiveTime,
    /// ISO weekday ordinals, 1=Monday .. 7=Sunday
    #[serde(default = "default_work_days")]
    pub work_days: Vec<u8>,
    /// Stored and surfaced but not enforced by the slot finder
    #[serde(default = "default_max_tasks_per_day")]
    pub max_tasks_per_day: u32,
    /// Mandatory free minutes between a placement and its neighbours
    #[serde(default = "default_buffer_minutes")]
    pub buffer_time_minutes: u32,
    #[serde(default = "default_true")]
    pub weather_check_enabled: bool,
    #[serde(default = "default_true")]
    pub travel_time_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_scheduling_enabled: bool,
    /// IANA timezone name, e.g. "America/New_York"
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

// Default functions
fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}
fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap()
}
fn default_work_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}
fn default_max_tasks_per_day() -> u32 {
    5
}
fn default_buffer_minutes() -> u32 {
    15
}
fn default_true() -> bool {
    true
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for SchedulingPreferences {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            preferred_start_time: default_start_time(),
            preferred_end_time: default_end_time(),
            work_days: default_work_days(),
            max_tasks_per_day: default_max_tasks_per_day(),
            buffer_time_minutes: default_buffer_minutes(),
            weather_check_enabled: true,
            travel_time_enabled: true,
            auto_scheduling_enabled: true,
            timezone: default_timezone(),
        }
    }
}

impl SchedulingPreferences {
    /// Default preferences for a user, as created lazily on first use.
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Whether `weekday` is one of the configured work days.
    pub fn is_work_day(&self, weekday: Weekday) -> bool {
        let ordinal = weekday.number_from_monday() as u8;
        self.work_days.contains(&ordinal)
    }

    /// Resolve the stored timezone name, degrading to UTC with a warning.
    ///
    /// An unparseable name is a misconfiguration, but scheduling should not
    /// stop for it; validation at update time is the strict path.
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = %self.timezone, "unknown timezone in preferences, using UTC");
                chrono_tz::UTC
            }
        }
    }

    /// Strict validation, used when preferences are updated explicitly.
    pub fn validate(&self) -> Result<()> {
        if self.preferred_end_time <= self.preferred_start_time {
            return Err(ValidationError::InvalidValue {
                field: "preferred_end_time".into(),
                message: format!(
                    "end time {} must be after start time {}",
                    self.preferred_end_time, self.preferred_start_time
                ),
            }
            .into());
        }
        if let Some(bad) = self.work_days.iter().find(|d| **d < 1 || **d > 7) {
            return Err(ValidationError::InvalidValue {
                field: "work_days".into(),
                message: format!("weekday ordinal {bad} is outside 1..=7"),
            }
            .into());
        }
        if self.timezone.parse::<Tz>().is_err() {
            return Err(ValidationError::UnknownTimezone(self.timezone.clone()).into());
        }
        Ok(())
    }
}

//! Calendar events: the immovable commitments the scheduler plans around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::interval::{Interval, IntervalSource};

/// A fixed appointment on a user's calendar.
///
/// Events are opaque to the scheduler: it never moves or shortens them,
/// it only routes task placements around their spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Unique id, `event-{unix_ts}-{uuid}`
    pub id: String,
    /// Owning user
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Event start (UTC)
    pub start_time: DateTime<Utc>,
    /// Event end (UTC), exclusive
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self> {
        if end_time < start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            }
            .into());
        }
        let now = Utc::now();
        Ok(Self {
            id: format!("event-{}-{}", now.timestamp(), uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            start_time,
            end_time,
            location: None,
            created_at: now,
        })
    }

    /// The busy span this event occupies.
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
            source: IntervalSource::Calendar,
        }
    }
}

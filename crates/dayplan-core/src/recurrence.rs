//! Recurrence patterns and next-occurrence computation.
//!
//! When a recurring task completes, the engine projects its next due date
//! from the completion instant and reopens the task. Month arithmetic is
//! calendar-aware: chrono clamps Jan 31 + 1 month to Feb 28/29 instead of
//! skipping into March.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// How often a task recurs.
///
/// Unrecognized frequency strings deserialize to `Unknown`, which yields no
/// next occurrence (the caller must not apply an update).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    #[serde(other)]
    Unknown,
}

/// A task's recurrence rule: `{type, interval}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub frequency: Frequency,
    /// Number of periods between occurrences; missing or zero means 1.
    #[serde(default = "default_interval")]
    pub interval: u32,
}

fn default_interval() -> u32 {
    1
}

impl RecurrencePattern {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
        }
    }

    /// Compute the next occurrence after `from`, preserving time of day.
    ///
    /// Returns None for an unknown frequency, or in the degenerate case
    /// where month arithmetic overflows the representable range.
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = self.interval.max(1);
        match self.frequency {
            Frequency::Daily => Some(from + Duration::days(i64::from(interval))),
            Frequency::Weekly => Some(from + Duration::weeks(i64::from(interval))),
            Frequency::Monthly => from.checked_add_months(Months::new(interval)),
            Frequency::Unknown => None,
        }
    }
}

//! Time intervals and their source tags.
//!
//! `Interval` is the unit the whole scheduling pipeline operates on: a
//! half-open span `[start, end)` tagged with where it came from. Intervals
//! are never persisted; they are derived fresh each run from calendar
//! events and tasks, plus the placements made earlier in the same run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Where an interval was derived from.
///
/// The declaration order is meaningful: intervals sharing a start instant
/// sort `Calendar < Task < NewlyScheduled`. The tie-break is arbitrary but
/// must stay stable, because greedy placement walks the sorted list and a
/// reordering would change which slot is found first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalSource {
    Calendar,
    Task,
    NewlyScheduled,
}

/// A half-open time span `[start, end)` with a source tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: IntervalSource,
}

impl Interval {
    /// Construct an interval, rejecting spans that end before they start.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, source: IntervalSource) -> Result<Self> {
        if end < start {
            return Err(ValidationError::InvalidTimeRange { start, end }.into());
        }
        Ok(Self { start, end, source })
    }

    /// Half-open overlap test: `[a, b)` and `[c, d)` overlap iff `a < d && b > c`.
    ///
    /// Touching intervals (one ends exactly where the other starts) do not
    /// overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whole minutes covered by the span.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Sort key: start instant first, source tag as the stable tie-break.
    pub fn sort_key(&self) -> (DateTime<Utc>, IntervalSource) {
        (self.start, self.source)
    }
}

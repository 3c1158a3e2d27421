//! First-fit slot finding over sorted commitments.
//!
//! `find_slot` is a pure function: no clock reads, no I/O, no hidden
//! configuration. Day arithmetic happens in the caller's timezone; all
//! instants in and out are UTC. Placement is first-fit rather than
//! best-fit, accepting fragmentation in exchange for predictable,
//! explainable results.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::preferences::SchedulingPreferences;

/// Search constraints derived from a user's preferences.
#[derive(Debug, Clone)]
pub struct SlotConstraints {
    /// Free minutes required between a placement and its neighbours
    pub buffer_minutes: i64,
    /// ISO weekday ordinals eligible for placement, 1=Monday .. 7=Sunday
    pub work_days: Vec<u8>,
    /// Work-window start time of day
    pub work_start: NaiveTime,
    /// Work-window end time of day
    pub work_end: NaiveTime,
    /// Days to scan before falling back
    pub lookahead_days: i64,
    /// Timezone for day boundaries and weekday computation
    pub timezone: Tz,
}

impl SlotConstraints {
    pub fn from_preferences(prefs: &SchedulingPreferences, lookahead_days: i64) -> Self {
        Self {
            buffer_minutes: i64::from(prefs.buffer_time_minutes),
            work_days: prefs.work_days.clone(),
            work_start: prefs.preferred_start_time,
            work_end: prefs.preferred_end_time,
            lookahead_days,
            timezone: prefs.tz(),
        }
    }

    fn is_work_day(&self, date: NaiveDate) -> bool {
        let ordinal = date.weekday().number_from_monday() as u8;
        self.work_days.contains(&ordinal)
    }

    /// Work window for `date`, or None when the local times do not exist
    /// (DST gap) or the window is empty.
    fn work_window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = local_instant(self.timezone, date, self.work_start)?;
        let end = local_instant(self.timezone, date, self.work_end)?;
        if end <= start {
            return None;
        }
        Some((start, end))
    }
}

/// A placement candidate: `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Result of a slot search.
///
/// `Fallback` placements ignore conflicts and must be treated as
/// low-confidence by callers; `Unschedulable` means no eligible work day
/// exists at all (a preferences misconfiguration, distinct from a busy
/// calendar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOutcome {
    Normal(Slot),
    Fallback(Slot),
    Unschedulable,
}

impl SlotOutcome {
    /// The chosen slot, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            SlotOutcome::Normal(slot) | SlotOutcome::Fallback(slot) => Some(*slot),
            SlotOutcome::Unschedulable => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SlotOutcome::Fallback(_))
    }
}

/// Find the earliest slot of `duration_minutes` that fits the constraints.
///
/// `commitments` must be sorted ascending by `(start, source)`, the order
/// the commitment aggregator produces. The scan walks day offsets
/// `0..lookahead_days` from the day containing `now` in the constraint
/// timezone; within a day, only commitments whose start falls on that local
/// date are considered (a span crossing midnight binds to its start day
/// only). The cursor starts at `max(work_start, now)` and advances past
/// each blocking commitment plus buffer, never backwards, so nested or
/// already-passed commitments cannot regress it.
///
/// When no conflict-free slot exists, the first eligible work day in
/// offsets `1..=lookahead_days` yields a `Fallback` placement at the work
/// start, conflicts ignored. With no eligible day at all the outcome is
/// `Unschedulable`.
pub fn find_slot(
    commitments: &[Interval],
    duration_minutes: i64,
    constraints: &SlotConstraints,
    now: DateTime<Utc>,
) -> SlotOutcome {
    let duration = Duration::minutes(duration_minutes);
    let buffer = Duration::minutes(constraints.buffer_minutes);
    let today = now.with_timezone(&constraints.timezone).date_naive();

    for offset in 0..constraints.lookahead_days {
        let date = today + Duration::days(offset);
        if !constraints.is_work_day(date) {
            continue;
        }
        let Some((day_start, day_end)) = constraints.work_window(date) else {
            continue;
        };

        let mut t = day_start.max(now);
        if t >= day_end {
            // Work window already elapsed (day 0 late in the day).
            continue;
        }

        for c in commitments
            .iter()
            .filter(|c| local_date(c.start, constraints.timezone) == date)
        {
            if c.start >= day_end {
                // Outside the work window; remaining space is judged below.
                break;
            }
            if c.start - t >= duration + buffer {
                return SlotOutcome::Normal(Slot {
                    start: t,
                    end: t + duration,
                });
            }
            t = t.max(c.end + buffer);
            if t >= day_end {
                break;
            }
        }

        if day_end - t >= duration + buffer {
            return SlotOutcome::Normal(Slot {
                start: t,
                end: t + duration,
            });
        }
    }

    // No conflict-free slot inside the lookahead: best-effort placement on
    // the first eligible work day, conflicts ignored.
    for offset in 1..=constraints.lookahead_days {
        let date = today + Duration::days(offset);
        if !constraints.is_work_day(date) {
            continue;
        }
        if let Some((day_start, _)) = constraints.work_window(date) {
            return SlotOutcome::Fallback(Slot {
                start: day_start,
                end: day_start + duration,
            });
        }
    }

    SlotOutcome::Unschedulable
}

/// Resolve a local wall-clock time on `date` to a UTC instant.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; nonexistent
/// times (DST gap) resolve to None.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

//! Commitment aggregation: one sorted busy-list from every source.
//!
//! The scheduler plans against calendar events, tasks that already hold a
//! scheduled time, and placements made earlier in the same run. A source
//! that fails to load degrades to empty with a warning rather than
//! aborting the run; scheduling against partial knowledge beats not
//! scheduling at all, at the cost of possible double-booking.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::interval::Interval;
use crate::stores::{CalendarStore, TaskStore};

pub struct CommitmentAggregator<'a> {
    calendar: &'a dyn CalendarStore,
    tasks: &'a dyn TaskStore,
}

impl<'a> CommitmentAggregator<'a> {
    pub fn new(calendar: &'a dyn CalendarStore, tasks: &'a dyn TaskStore) -> Self {
        Self { calendar, tasks }
    }

    /// Collect every commitment whose start falls within `window_days` days
    /// of `window_start`, plus the `extras` accumulated by the caller, as
    /// one list sorted by `(start, source)`.
    ///
    /// Inverted spans coming out of storage are dropped with a warning;
    /// zero-length spans are kept (they block nothing).
    pub fn collect(
        &self,
        user_id: &str,
        window_start: DateTime<Utc>,
        window_days: i64,
        extras: &[Interval],
    ) -> Vec<Interval> {
        let window_end = window_start + Duration::days(window_days);
        let mut intervals: Vec<Interval> = Vec::new();

        match self.calendar.events_between(user_id, window_start, window_end) {
            Ok(events) => intervals.extend(events.iter().map(|e| e.interval())),
            Err(err) => {
                warn!(user_id, error = %err, "calendar unavailable, scheduling without events");
            }
        }

        match self
            .tasks
            .scheduled_tasks_between(user_id, window_start, window_end)
        {
            Ok(tasks) => intervals.extend(tasks.iter().filter_map(|t| t.scheduled_interval())),
            Err(err) => {
                warn!(user_id, error = %err, "scheduled tasks unavailable, scheduling without them");
            }
        }

        intervals.extend_from_slice(extras);

        intervals.retain(|i| {
            if i.end < i.start {
                warn!(start = %i.start, end = %i.end, "dropping inverted commitment span");
                false
            } else {
                true
            }
        });

        intervals.sort_by_key(|i| i.sort_key());
        intervals
    }
}

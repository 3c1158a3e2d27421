//! Storage traits the scheduling engine depends on.
//!
//! The engine never talks to SQLite directly; it sees these seams so tests
//! can substitute in-memory fakes and failure injectors. `SchedulerDb`
//! implements all four. Runs are single-threaded, one user at a time, so
//! the seams carry no thread-safety bounds.

use chrono::{DateTime, Utc};

use crate::calendar::CalendarEvent;
use crate::error::Result;
use crate::preferences::SchedulingPreferences;
use crate::scheduler::RunRecord;
use crate::task::Task;

/// Access to per-user scheduling preferences.
pub trait PreferenceStore {
    /// Preferences for `user_id`. When none are saved yet, implementations
    /// return the defaults; persistent stores save them so first read and
    /// later edits share one row. A failure here aborts a scheduling run.
    fn preferences_for(&self, user_id: &str) -> Result<SchedulingPreferences>;

    /// Persist preferences, replacing any previous row.
    fn save_preferences(&self, prefs: &SchedulingPreferences) -> Result<()>;
}

/// Access to tasks.
pub trait TaskStore {
    /// Look up a single task.
    fn task_by_id(&self, id: &str) -> Result<Option<Task>>;

    /// Tasks eligible for automatic placement: auto-scheduling enabled and
    /// not yet started, ordered by priority (high first) then creation time.
    fn eligible_tasks(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Tasks that already hold a scheduled time starting within `[from, to)`,
    /// excluding completed tasks and tasks still awaiting placement.
    fn scheduled_tasks_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>>;

    /// Persist an updated task.
    fn update_task(&self, task: &Task) -> Result<()>;
}

/// Access to calendar events.
pub trait CalendarStore {
    /// Events starting within `[from, to)`.
    fn events_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Persist an event created for a placement.
    fn create_event(&self, event: &CalendarEvent) -> Result<()>;
}

/// Append-only log of scheduling runs.
pub trait HistoryStore {
    fn record_run(&self, record: &RunRecord) -> Result<()>;

    /// Most recent runs first.
    fn recent_runs(&self, user_id: &str, limit: u32) -> Result<Vec<RunRecord>>;
}

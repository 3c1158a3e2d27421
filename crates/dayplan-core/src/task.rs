//! Task model for the auto-scheduling engine.
//!
//! A task carries everything the scheduler needs to place it: duration,
//! priority, scheduling toggles, optional location (for weather and travel
//! gating) and an optional recurrence pattern. The due date doubles as the
//! scheduled start once the engine has placed the task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, IntervalSource};
use crate::recurrence::RecurrencePattern;

/// Fallback duration when a task has no estimate, in minutes.
pub const DEFAULT_ESTIMATED_MINUTES: u32 = 60;

/// Task lifecycle status.
///
/// `NotStarted` tasks are candidates for auto-scheduling; a placement moves
/// the task to `InProgress`, which removes it from the candidate set (so a
/// re-run cannot double-book it) while its due date keeps its slot occupied
/// as a commitment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet placed or worked on (initial state)
    NotStarted,
    /// Placed by the engine or picked up by the user
    InProgress,
    /// Completed (terminal; recurrence may reopen the task)
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

/// Ordinal task priority. Higher priorities are scheduled first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// A unit of work owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Task title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Estimated duration in minutes (None means 60 for scheduling)
    pub estimated_duration_minutes: Option<u32>,
    /// Scheduling priority
    pub priority: TaskPriority,
    /// Due date; doubles as the scheduled start once placed
    pub due_date: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Whether the engine may place this task
    pub auto_schedule_enabled: bool,
    /// Whether placement is gated on outdoor-suitable weather
    pub weather_dependent: bool,
    /// Optional location, consulted for weather and travel time
    pub location: Option<String>,
    /// Named windows like "morning"; advisory only, not consulted by the finder
    #[serde(default)]
    pub preferred_time_windows: Vec<String>,
    /// Recurrence pattern, applied when the task completes
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Travel minutes written back by the engine at placement
    pub travel_time_minutes: Option<u32>,
    /// When the engine last placed (or reopened) this task
    pub last_scheduled_date: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with default values.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Task {
            id: format!("task-{}-{}", now.timestamp(), uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            estimated_duration_minutes: None,
            priority: TaskPriority::Medium,
            due_date: None,
            status: TaskStatus::NotStarted,
            auto_schedule_enabled: true,
            weather_dependent: false,
            location: None,
            preferred_time_windows: Vec::new(),
            recurrence_pattern: None,
            travel_time_minutes: None,
            last_scheduled_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Duration the slot search must fit, before travel inflation.
    pub fn scheduling_duration_minutes(&self) -> i64 {
        i64::from(
            self.estimated_duration_minutes
                .unwrap_or(DEFAULT_ESTIMATED_MINUTES),
        )
    }

    /// Whether this task is a candidate for the next scheduling run.
    pub fn auto_schedulable(&self) -> bool {
        self.auto_schedule_enabled && self.status == TaskStatus::NotStarted
    }

    /// Record an engine placement: the due date becomes the slot start and
    /// the task leaves the candidate set.
    pub fn apply_placement(
        &mut self,
        start: DateTime<Utc>,
        travel_minutes: Option<u32>,
        now: DateTime<Utc>,
    ) {
        self.due_date = Some(start);
        self.status = TaskStatus::InProgress;
        if travel_minutes.is_some() {
            self.travel_time_minutes = travel_minutes;
        }
        self.last_scheduled_date = Some(now);
        self.updated_at = now;
    }

    /// Mark the task completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.updated_at = now;
    }

    /// Reopen a completed recurring task for its next occurrence.
    pub fn reopen_for(&mut self, next_due: DateTime<Utc>, now: DateTime<Utc>) {
        self.due_date = Some(next_due);
        self.status = TaskStatus::NotStarted;
        self.last_scheduled_date = Some(now);
        self.updated_at = now;
    }

    /// The interval this task occupies once placed, or None without a due
    /// date. Placed tasks enter commitment aggregation through this span.
    pub fn scheduled_interval(&self) -> Option<Interval> {
        let start = self.due_date?;
        let end = start + chrono::Duration::minutes(self.scheduling_duration_minutes());
        Some(Interval {
            start,
            end,
            source: IntervalSource::Task,
        })
    }
}

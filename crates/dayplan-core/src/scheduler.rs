//! The scheduling engine: eligibility, gating, placement, persistence.
//!
//! A run works through one user's eligible tasks in priority order. Each
//! task is weather-gated, its footprint inflated by travel time, then
//! handed to the slot finder against the commitments collected so far,
//! including placements made earlier in the same run. Those are threaded
//! through explicitly so correctness never depends on storage reads
//! observing this run's own writes. One task failing never aborts the
//! run; its outcome is recorded and the loop moves on.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::CalendarEvent;
use crate::commitments::CommitmentAggregator;
use crate::error::{CoreError, Result};
use crate::interval::{Interval, IntervalSource};
use crate::preferences::SchedulingPreferences;
use crate::services::{NotificationService, TravelMode, TravelTimeService, WeatherService};
use crate::slot::{find_slot, Slot, SlotConstraints};
use crate::stores::{CalendarStore, HistoryStore, PreferenceStore, TaskStore};
use crate::task::{Task, TaskStatus};

/// Days scanned for a slot before falling back, unless overridden.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 14;

/// Symbolic origin used for travel estimates. The user's actual position
/// is unknown to the engine, so estimates start from this token and the
/// travel service resolves it to its flat estimate.
const TRAVEL_ORIGIN: &str = "current_location";

/// How one task fared in a run.
///
/// `Failed` is a scheduling outcome (no slot); `Error` is an operational
/// one (a store or service call blew up mid-task).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Scheduled {
        scheduled_time: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        calendar_event_id: Option<String>,
        /// Minutes the footprint was inflated by, when travel was estimated.
        #[serde(skip_serializing_if = "Option::is_none")]
        travel_minutes: Option<u32>,
        /// True when the placement ignored conflicts (best-effort).
        #[serde(default)]
        fallback: bool,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
    Error {
        message: String,
    },
}

/// Per-task line item in a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub task_title: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// Aggregate result of a scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Human-readable one-liner, also used as the notification body.
    pub message: String,
    pub results: Vec<TaskOutcome>,
    pub total_tasks: u32,
    pub successful: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunSummary {
    /// A run that did nothing, e.g. when auto-scheduling is disabled.
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            results: Vec::new(),
            total_tasks: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// A persisted run, one row of scheduling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub user_id: String,
    pub run_at: DateTime<Utc>,
    pub summary: RunSummary,
}

impl RunRecord {
    pub fn new(user_id: impl Into<String>, run_at: DateTime<Utc>, summary: RunSummary) -> Self {
        Self {
            id: format!("run-{}-{}", run_at.timestamp(), uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            run_at,
            summary,
        }
    }
}

/// Result of completing a task, including any recurrence reopening.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    /// The task in its post-completion state.
    pub task: Task,
    /// Next occurrence the task was reopened for, if it recurs.
    pub rescheduled_for: Option<DateTime<Utc>>,
}

/// The auto-scheduling engine.
///
/// Borrows its stores and optional services; a run is synchronous and
/// single-user. Construct one per operation:
///
/// ```ignore
/// let engine = SchedulingEngine::new(&db, &db, &db, &db)
///     .with_weather(&weather)
///     .with_travel(&travel)
///     .with_notifier(&db);
/// let summary = engine.run("local")?;
/// ```
pub struct SchedulingEngine<'a> {
    preferences: &'a dyn PreferenceStore,
    tasks: &'a dyn TaskStore,
    calendar: &'a dyn CalendarStore,
    history: &'a dyn HistoryStore,
    weather: Option<&'a dyn WeatherService>,
    travel: Option<&'a dyn TravelTimeService>,
    notifier: Option<&'a dyn NotificationService>,
    lookahead_days: i64,
    dry_run: bool,
}

impl<'a> SchedulingEngine<'a> {
    pub fn new(
        preferences: &'a dyn PreferenceStore,
        tasks: &'a dyn TaskStore,
        calendar: &'a dyn CalendarStore,
        history: &'a dyn HistoryStore,
    ) -> Self {
        Self {
            preferences,
            tasks,
            calendar,
            history,
            weather: None,
            travel: None,
            notifier: None,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            dry_run: false,
        }
    }

    pub fn with_weather(mut self, weather: &'a dyn WeatherService) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_travel(mut self, travel: &'a dyn TravelTimeService) -> Self {
        self.travel = Some(travel);
        self
    }

    pub fn with_notifier(mut self, notifier: &'a dyn NotificationService) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_lookahead_days(mut self, days: i64) -> Self {
        self.lookahead_days = days;
        self
    }

    /// Preview placements without writing anything: no task updates, no
    /// calendar events, no history, no notification. The placement walk is
    /// the live one, including run-local accumulation.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Schedule every eligible task for `user_id`, starting from now.
    ///
    /// Runs are not coordinated with each other: two concurrent runs for
    /// the same user can double-book. Callers must keep at most one run
    /// active per user.
    pub fn run(&self, user_id: &str) -> Result<RunSummary> {
        self.run_at(user_id, Utc::now())
    }

    /// Schedule every eligible task for `user_id`, starting from `now`.
    ///
    /// Preference and eligible-task lookups are fatal; everything after
    /// that degrades per task.
    pub fn run_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<RunSummary> {
        let prefs = self.preferences.preferences_for(user_id)?;
        if !prefs.auto_scheduling_enabled {
            debug!(user_id, "auto-scheduling disabled, skipping run");
            return Ok(RunSummary::empty("Auto-scheduling is disabled"));
        }

        let tasks = self.tasks.eligible_tasks(user_id)?;
        self.place_all(user_id, &prefs, tasks, now)
    }

    /// Schedule one task by id, on explicit request.
    pub fn schedule_task(&self, task_id: &str) -> Result<RunSummary> {
        self.schedule_task_at(task_id, Utc::now())
    }

    /// Schedule one task by id, starting from `now`.
    ///
    /// Runs the same placement path as [`run_at`](Self::run_at) with a
    /// single-element batch. The per-user auto-scheduling toggle and the
    /// task's own auto-schedule flag are not consulted: an explicit
    /// request overrides both. A task that is already placed or completed
    /// comes back as a skipped outcome.
    pub fn schedule_task_at(&self, task_id: &str, now: DateTime<Utc>) -> Result<RunSummary> {
        let task = self
            .tasks
            .task_by_id(task_id)?
            .ok_or_else(|| CoreError::Custom(format!("task {task_id} not found")))?;
        let user_id = task.user_id.clone();
        let prefs = self.preferences.preferences_for(&user_id)?;
        self.place_all(&user_id, &prefs, vec![task], now)
    }

    /// Mark a task completed; recurring tasks are reopened for their next
    /// occurrence, projected from the completion instant.
    ///
    /// Completion and reopening are separate writes: when reopening fails,
    /// the error surfaces with the completion already persisted.
    pub fn complete_task(&self, task_id: &str) -> Result<CompletionOutcome> {
        self.complete_task_at(task_id, Utc::now())
    }

    /// Mark a task completed as of `now`.
    pub fn complete_task_at(&self, task_id: &str, now: DateTime<Utc>) -> Result<CompletionOutcome> {
        let mut task = self
            .tasks
            .task_by_id(task_id)?
            .ok_or_else(|| CoreError::Custom(format!("task {task_id} not found")))?;

        if task.status == TaskStatus::Completed {
            // Completing twice must not project another occurrence.
            return Ok(CompletionOutcome {
                task,
                rescheduled_for: None,
            });
        }

        task.mark_completed(now);
        self.tasks.update_task(&task)?;

        let rescheduled_for = task
            .recurrence_pattern
            .and_then(|pattern| pattern.next_occurrence(now));
        if let Some(next_due) = rescheduled_for {
            task.reopen_for(next_due, now);
            // A failure here leaves the completion persisted; the two
            // writes have no rollback.
            self.tasks.update_task(&task)?;
            debug!(task_id = %task.id, next_due = %next_due, "recurring task reopened");
        }

        Ok(CompletionOutcome {
            task,
            rescheduled_for,
        })
    }

    fn place_all(
        &self,
        user_id: &str,
        prefs: &SchedulingPreferences,
        tasks: Vec<Task>,
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let constraints = SlotConstraints::from_preferences(prefs, self.lookahead_days);
        let aggregator = CommitmentAggregator::new(self.calendar, self.tasks);
        let window_start = self.window_start(now, &constraints);
        let window_days = self.lookahead_days + 1;

        let total_tasks = tasks.len() as u32;
        let mut results = Vec::with_capacity(tasks.len());
        let mut placed_spans: Vec<Interval> = Vec::new();

        for task in &tasks {
            // Re-collect with this run's placements so far; a placement the
            // store already reflects shows up twice, which the finder
            // tolerates (identical spans advance the cursor identically).
            let commitments = aggregator.collect(user_id, window_start, window_days, &placed_spans);
            let resolution = match self.place_one(task, prefs, &constraints, &commitments, now) {
                Ok((resolution, span)) => {
                    placed_spans.extend(span);
                    resolution
                }
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "task placement failed");
                    Resolution::Error {
                        message: err.to_string(),
                    }
                }
            };
            results.push(TaskOutcome {
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                resolution,
            });
        }

        let successful = results
            .iter()
            .filter(|r| matches!(r.resolution, Resolution::Scheduled { .. }))
            .count() as u32;
        let skipped = results
            .iter()
            .filter(|r| matches!(r.resolution, Resolution::Skipped { .. }))
            .count() as u32;
        let failed = results
            .iter()
            .filter(|r| {
                matches!(
                    r.resolution,
                    Resolution::Failed { .. } | Resolution::Error { .. }
                )
            })
            .count() as u32;

        let summary = RunSummary {
            message: format!(
                "Scheduled {successful} of {total_tasks} tasks ({failed} failed, {skipped} skipped)"
            ),
            results,
            total_tasks,
            successful,
            failed,
            skipped,
        };
        info!(
            user_id,
            total_tasks,
            successful,
            failed,
            skipped,
            dry_run = self.dry_run,
            "scheduling run finished"
        );

        if self.dry_run {
            return Ok(summary);
        }

        let record = RunRecord::new(user_id, now, summary.clone());
        if let Err(err) = self.history.record_run(&record) {
            warn!(user_id, error = %err, "could not record run history");
        }

        if total_tasks > 0 {
            if let Some(notifier) = self.notifier {
                if let Err(err) =
                    notifier.notify(user_id, "Auto-scheduling complete", &summary.message)
                {
                    warn!(user_id, error = %err, "could not send run notification");
                }
            }
        }

        Ok(summary)
    }

    /// Place one task. Returns its resolution plus the busy span to thread
    /// into later placements, if one was made. An `Err` here means the
    /// placement could not be persisted; the caller turns it into an
    /// `Error` outcome without aborting the run.
    fn place_one(
        &self,
        task: &Task,
        prefs: &SchedulingPreferences,
        constraints: &SlotConstraints,
        commitments: &[Interval],
        now: DateTime<Utc>,
    ) -> Result<(Resolution, Option<Interval>)> {
        if task.status != TaskStatus::NotStarted {
            return Ok((
                Resolution::Skipped {
                    reason: "Task is already scheduled or completed".to_string(),
                },
                None,
            ));
        }

        if let Some(reason) = self.weather_gate(task, prefs, now) {
            return Ok((Resolution::Skipped { reason }, None));
        }

        let travel_minutes = self.travel_minutes(task, prefs);
        let footprint = task.scheduling_duration_minutes() + i64::from(travel_minutes.unwrap_or(0));

        let outcome = find_slot(commitments, footprint, constraints, now);
        let Some(slot) = outcome.slot() else {
            return Ok((
                Resolution::Failed {
                    reason: format!(
                        "No eligible work day within the next {} days",
                        constraints.lookahead_days
                    ),
                },
                None,
            ));
        };
        let fallback = outcome.is_fallback();
        if fallback {
            debug!(task_id = %task.id, start = %slot.start, "no conflict-free slot, placing best-effort");
        }

        let calendar_event_id = if self.dry_run {
            None
        } else {
            let mut placed = task.clone();
            placed.apply_placement(slot.start, travel_minutes, now);
            self.tasks.update_task(&placed)?;
            self.create_slot_event(&placed, slot)
        };

        Ok((
            Resolution::Scheduled {
                scheduled_time: slot.start,
                calendar_event_id,
                travel_minutes,
                fallback,
            },
            Some(Interval {
                start: slot.start,
                end: slot.end,
                source: IntervalSource::NewlyScheduled,
            }),
        ))
    }

    /// Gate a weather-dependent task on current conditions at its location.
    /// Returns a skip reason when conditions are known to be unsuitable; a
    /// weather outage lets the task through.
    fn weather_gate(
        &self,
        task: &Task,
        prefs: &SchedulingPreferences,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if !task.weather_dependent || !prefs.weather_check_enabled {
            return None;
        }
        let (Some(weather), Some(location)) = (self.weather, task.location.as_deref()) else {
            return None;
        };
        match weather.conditions(location, now) {
            Ok(report) if !report.suitable_for_outdoor => Some(format!(
                "Weather unsuitable for outdoor task: {}",
                report.condition
            )),
            Ok(_) => None,
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "weather check failed, proceeding without it");
                None
            }
        }
    }

    fn travel_minutes(&self, task: &Task, prefs: &SchedulingPreferences) -> Option<u32> {
        if !prefs.travel_time_enabled {
            return None;
        }
        let (Some(travel), Some(location)) = (self.travel, task.location.as_deref()) else {
            return None;
        };
        match travel.estimate(TRAVEL_ORIGIN, location, TravelMode::default()) {
            Ok(estimate) => Some(estimate.duration_minutes),
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "travel estimate failed, scheduling without it");
                None
            }
        }
    }

    /// Block the slot on the user's calendar. Failure is logged, not
    /// propagated: the task placement already stands on its own.
    fn create_slot_event(&self, task: &Task, slot: Slot) -> Option<String> {
        let mut event =
            match CalendarEvent::new(task.user_id.as_str(), task.title.as_str(), slot.start, slot.end)
            {
                Ok(event) => event,
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "could not build calendar event");
                    return None;
                }
            };
        event.description = task.description.clone();
        event.location = task.location.clone();

        match self.calendar.create_event(&event) {
            Ok(()) => Some(event.id),
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "calendar event creation failed, task stays scheduled");
                None
            }
        }
    }

    /// Start of the local day containing `now`, in UTC. Commitments are
    /// collected from here so spans that began earlier today still count.
    fn window_start(&self, now: DateTime<Utc>, constraints: &SlotConstraints) -> DateTime<Utc> {
        let tz = constraints.timezone;
        let midnight = now
            .with_timezone(&tz)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        match midnight {
            Some(instant) => instant.with_timezone(&Utc),
            // Local midnight fell in a DST gap; reach back far enough to
            // cover anything that could span `now`.
            None => now - Duration::days(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Frequency, RecurrencePattern};
    use crate::services::{TravelEstimate, WeatherReport};
    use crate::task::TaskPriority;
    use std::cell::{Cell, RefCell};

    // 2025-06-02 is a Monday.
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn tuesday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 3, h, m, 0).unwrap()
    }

    /// In-memory store implementing every seam, with per-call failure
    /// toggles for degradation tests.
    #[derive(Default)]
    struct MemoryStore {
        prefs: RefCell<Option<SchedulingPreferences>>,
        tasks: RefCell<Vec<Task>>,
        events: RefCell<Vec<CalendarEvent>>,
        runs: RefCell<Vec<RunRecord>>,
        notifications: RefCell<Vec<(String, String)>>,
        fail_update_for: RefCell<Option<String>>,
        // When set, allows that many task updates to succeed and fails
        // every one after.
        fail_updates_after: Cell<Option<u32>>,
        fail_event_creation: Cell<bool>,
        fail_calendar_reads: Cell<bool>,
        // When set, updates land in a side buffer instead of the task
        // list, simulating a store whose reads lag its writes.
        stale_reads: Cell<bool>,
        stale_updates: RefCell<Vec<Task>>,
    }

    impl MemoryStore {
        fn with_prefs(prefs: SchedulingPreferences) -> Self {
            let store = Self::default();
            *store.prefs.borrow_mut() = Some(prefs);
            store
        }

        fn add_task(&self, task: Task) -> String {
            let id = task.id.clone();
            self.tasks.borrow_mut().push(task);
            id
        }

        fn add_event(&self, event: CalendarEvent) {
            self.events.borrow_mut().push(event);
        }

        fn task(&self, id: &str) -> Task {
            self.tasks
                .borrow()
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .unwrap()
        }
    }

    impl PreferenceStore for MemoryStore {
        fn preferences_for(&self, user_id: &str) -> Result<SchedulingPreferences> {
            Ok(self
                .prefs
                .borrow()
                .clone()
                .unwrap_or_else(|| SchedulingPreferences::defaults_for(user_id)))
        }

        fn save_preferences(&self, prefs: &SchedulingPreferences) -> Result<()> {
            *self.prefs.borrow_mut() = Some(prefs.clone());
            Ok(())
        }
    }

    impl TaskStore for MemoryStore {
        fn task_by_id(&self, id: &str) -> Result<Option<Task>> {
            Ok(self.tasks.borrow().iter().find(|t| t.id == id).cloned())
        }

        fn eligible_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
            let mut tasks: Vec<Task> = self
                .tasks
                .borrow()
                .iter()
                .filter(|t| t.user_id == user_id && t.auto_schedulable())
                .cloned()
                .collect();
            tasks.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            });
            Ok(tasks)
        }

        fn scheduled_tasks_between(
            &self,
            user_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Task>> {
            Ok(self
                .tasks
                .borrow()
                .iter()
                .filter(|t| {
                    t.user_id == user_id
                        && t.status != TaskStatus::Completed
                        && !t.auto_schedulable()
                        && t.due_date.map(|d| d >= from && d < to).unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        fn update_task(&self, task: &Task) -> Result<()> {
            if self.fail_update_for.borrow().as_deref() == Some(task.id.as_str()) {
                return Err(CoreError::service("tasks", "store offline"));
            }
            if let Some(remaining) = self.fail_updates_after.get() {
                if remaining == 0 {
                    return Err(CoreError::service("tasks", "store offline"));
                }
                self.fail_updates_after.set(Some(remaining - 1));
            }
            if self.stale_reads.get() {
                self.stale_updates.borrow_mut().push(task.clone());
                return Ok(());
            }
            let mut tasks = self.tasks.borrow_mut();
            if let Some(existing) = tasks.iter_mut().find(|t| t.id == task.id) {
                *existing = task.clone();
            }
            Ok(())
        }
    }

    impl CalendarStore for MemoryStore {
        fn events_between(
            &self,
            user_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>> {
            if self.fail_calendar_reads.get() {
                return Err(CoreError::service("calendar", "calendar offline"));
            }
            Ok(self
                .events
                .borrow()
                .iter()
                .filter(|e| e.user_id == user_id && e.start_time >= from && e.start_time < to)
                .cloned()
                .collect())
        }

        fn create_event(&self, event: &CalendarEvent) -> Result<()> {
            if self.fail_event_creation.get() {
                return Err(CoreError::service("calendar", "calendar offline"));
            }
            self.events.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    impl HistoryStore for MemoryStore {
        fn record_run(&self, record: &RunRecord) -> Result<()> {
            self.runs.borrow_mut().push(record.clone());
            Ok(())
        }

        fn recent_runs(&self, user_id: &str, limit: u32) -> Result<Vec<RunRecord>> {
            let mut runs: Vec<RunRecord> = self
                .runs
                .borrow()
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            runs.sort_by(|a, b| b.run_at.cmp(&a.run_at));
            runs.truncate(limit as usize);
            Ok(runs)
        }
    }

    impl NotificationService for MemoryStore {
        fn notify(&self, _user_id: &str, title: &str, body: &str) -> Result<()> {
            self.notifications
                .borrow_mut()
                .push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FixedWeather {
        suitable: bool,
        fail: bool,
    }

    impl WeatherService for FixedWeather {
        fn conditions(&self, _location: &str, _at: DateTime<Utc>) -> Result<WeatherReport> {
            if self.fail {
                return Err(CoreError::service("weather", "provider offline"));
            }
            Ok(WeatherReport {
                temperature_c: 20.0,
                condition: if self.suitable {
                    "clear sky".to_string()
                } else {
                    "thunderstorm".to_string()
                },
                precipitation_chance: if self.suitable { 0.1 } else { 0.9 },
                suitable_for_outdoor: self.suitable,
            })
        }
    }

    struct FixedTravel {
        minutes: u32,
    }

    impl TravelTimeService for FixedTravel {
        fn estimate(
            &self,
            _origin: &str,
            _destination: &str,
            mode: TravelMode,
        ) -> Result<TravelEstimate> {
            Ok(TravelEstimate {
                duration_minutes: self.minutes,
                distance_miles: 1.0,
                mode,
            })
        }
    }

    fn task_with_duration(store: &MemoryStore, title: &str, minutes: u32, order: u32) -> String {
        let mut task = Task::new("user-1", title);
        task.estimated_duration_minutes = Some(minutes);
        // Staggered creation times keep same-priority ordering stable.
        task.created_at = monday(0, order);
        store.add_task(task)
    }

    fn scheduled_start(summary: &RunSummary, index: usize) -> DateTime<Utc> {
        match &summary.results[index].resolution {
            Resolution::Scheduled { scheduled_time, .. } => *scheduled_time,
            other => panic!("expected a scheduled outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_a_run_walks_tasks_past_events_and_each_other() {
        let store = MemoryStore::default();
        store.add_event(
            CalendarEvent::new("user-1", "Standup", monday(10, 0), monday(11, 0)).unwrap(),
        );
        task_with_duration(&store, "Write report", 60, 1);
        task_with_duration(&store, "Review PRs", 60, 2);
        task_with_duration(&store, "Deep work", 120, 3);

        let engine = SchedulingEngine::new(&store, &store, &store, &store).with_notifier(&store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        // The 09:00-10:00 gap is 60 min, short of 60 + 15 buffer, so the
        // first task lands after the event; the rest stack behind it.
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(scheduled_start(&summary, 0), monday(11, 15));
        assert_eq!(scheduled_start(&summary, 1), monday(12, 30));
        assert_eq!(scheduled_start(&summary, 2), monday(13, 45));

        // Placements were persisted and blocked on the calendar.
        let events = store.events.borrow();
        assert_eq!(events.len(), 4);
        assert_eq!(store.runs.borrow().len(), 1);
        assert_eq!(store.notifications.borrow().len(), 1);
        assert_eq!(
            store.notifications.borrow()[0].1,
            "Scheduled 3 of 3 tasks (0 failed, 0 skipped)"
        );
    }

    #[test]
    fn test_high_priority_tasks_claim_earlier_slots() {
        let store = MemoryStore::default();
        task_with_duration(&store, "Routine", 60, 1);
        let urgent_id = {
            let mut task = Task::new("user-1", "Urgent");
            task.estimated_duration_minutes = Some(60);
            task.priority = TaskPriority::High;
            task.created_at = monday(0, 2);
            store.add_task(task)
        };

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.results[0].task_id, urgent_id);
        assert_eq!(scheduled_start(&summary, 0), monday(9, 0));
        assert_eq!(scheduled_start(&summary, 1), monday(10, 15));
    }

    #[test]
    fn test_disabled_preferences_short_circuit_the_run() {
        let mut prefs = SchedulingPreferences::defaults_for("user-1");
        prefs.auto_scheduling_enabled = false;
        let store = MemoryStore::with_prefs(prefs);
        let id = task_with_duration(&store, "Ignored", 30, 1);

        let engine = SchedulingEngine::new(&store, &store, &store, &store).with_notifier(&store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.message, "Auto-scheduling is disabled");
        assert_eq!(summary.total_tasks, 0);
        assert_eq!(store.task(&id).status, TaskStatus::NotStarted);
        assert!(store.runs.borrow().is_empty());
        assert!(store.notifications.borrow().is_empty());
    }

    #[test]
    fn test_unsuitable_weather_skips_outdoor_tasks_only() {
        let store = MemoryStore::default();
        let outdoor_id = {
            let mut task = Task::new("user-1", "Trim the hedge");
            task.estimated_duration_minutes = Some(60);
            task.weather_dependent = true;
            task.location = Some("Garden".to_string());
            task.created_at = monday(0, 1);
            store.add_task(task)
        };
        task_with_duration(&store, "Indoor work", 60, 2);

        let weather = FixedWeather {
            suitable: false,
            fail: false,
        };
        let engine =
            SchedulingEngine::new(&store, &store, &store, &store).with_weather(&weather);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.successful, 1);
        match &summary.results[0].resolution {
            Resolution::Skipped { reason } => assert!(reason.contains("thunderstorm")),
            other => panic!("expected a skip, got {other:?}"),
        }
        assert_eq!(store.task(&outdoor_id).status, TaskStatus::NotStarted);
        // The indoor task takes the first slot since nothing was placed
        // ahead of it.
        assert_eq!(scheduled_start(&summary, 1), monday(9, 0));
    }

    #[test]
    fn test_weather_outage_does_not_block_placement() {
        let store = MemoryStore::default();
        let mut task = Task::new("user-1", "Outdoor errand");
        task.estimated_duration_minutes = Some(30);
        task.weather_dependent = true;
        task.location = Some("Park".to_string());
        store.add_task(task);

        let weather = FixedWeather {
            suitable: false,
            fail: true,
        };
        let engine =
            SchedulingEngine::new(&store, &store, &store, &store).with_weather(&weather);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.successful, 1);
    }

    #[test]
    fn test_travel_time_inflates_the_footprint() {
        let store = MemoryStore::default();
        store.add_event(
            CalendarEvent::new("user-1", "Call", monday(10, 15), monday(11, 0)).unwrap(),
        );
        let id = {
            let mut task = Task::new("user-1", "Client visit");
            task.estimated_duration_minutes = Some(60);
            task.location = Some("12 Main St".to_string());
            store.add_task(task)
        };

        let travel = FixedTravel { minutes: 30 };
        let engine = SchedulingEngine::new(&store, &store, &store, &store).with_travel(&travel);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        // 60 min alone would fit before the 10:15 call (75-min gap), but
        // travel widens the footprint to 90 and pushes it past the call.
        assert_eq!(scheduled_start(&summary, 0), monday(11, 15));
        match &summary.results[0].resolution {
            Resolution::Scheduled { travel_minutes, .. } => {
                assert_eq!(*travel_minutes, Some(30));
            }
            other => panic!("expected a placement, got {other:?}"),
        }
        let placed = store.task(&id);
        assert_eq!(placed.travel_time_minutes, Some(30));

        // The calendar block covers travel as well.
        let events = store.events.borrow();
        let block = events.iter().find(|e| e.title == "Client visit").unwrap();
        assert_eq!((block.end_time - block.start_time).num_minutes(), 90);
    }

    #[test]
    fn test_a_failing_task_does_not_abort_the_run() {
        let store = MemoryStore::default();
        let first = task_with_duration(&store, "Cursed", 60, 1);
        task_with_duration(&store, "Fine", 60, 2);
        *store.fail_update_for.borrow_mut() = Some(first);

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert!(matches!(
            summary.results[0].resolution,
            Resolution::Error { .. }
        ));
        // The failed placement was never persisted, so the second task
        // still gets the morning slot.
        assert_eq!(scheduled_start(&summary, 1), monday(9, 0));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 1);
    }

    #[test]
    fn test_calendar_event_failure_keeps_the_placement() {
        let store = MemoryStore::default();
        let id = task_with_duration(&store, "Write report", 60, 1);
        store.fail_event_creation.set(true);

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        match &summary.results[0].resolution {
            Resolution::Scheduled {
                calendar_event_id, ..
            } => assert!(calendar_event_id.is_none()),
            other => panic!("expected a placement, got {other:?}"),
        }
        assert_eq!(store.task(&id).status, TaskStatus::InProgress);
    }

    #[test]
    fn test_calendar_read_outage_still_places_tasks() {
        let store = MemoryStore::default();
        task_with_duration(&store, "Write report", 60, 1);
        store.fail_calendar_reads.set(true);

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(scheduled_start(&summary, 0), monday(9, 0));
    }

    #[test]
    fn test_placements_block_later_tasks_even_when_reads_lag() {
        let store = MemoryStore::default();
        task_with_duration(&store, "First", 60, 1);
        task_with_duration(&store, "Second", 60, 2);
        store.stale_reads.set(true);

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        // The store never reflects the first placement, so only the
        // threaded span keeps the second task off the same slot.
        assert_eq!(scheduled_start(&summary, 0), monday(9, 0));
        assert_eq!(scheduled_start(&summary, 1), monday(10, 15));
    }

    #[test]
    fn test_fully_blocked_days_yield_a_fallback_placement() {
        let store = MemoryStore::default();
        for day in [2, 3] {
            store.add_event(
                CalendarEvent::new(
                    "user-1",
                    "Offsite",
                    Utc.with_ymd_and_hms(2025, 6, day, 9, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2025, 6, day, 17, 0, 0).unwrap(),
                )
                .unwrap(),
            );
        }
        task_with_duration(&store, "Squeezed", 60, 1);

        let engine =
            SchedulingEngine::new(&store, &store, &store, &store).with_lookahead_days(2);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        match &summary.results[0].resolution {
            Resolution::Scheduled {
                scheduled_time,
                fallback,
                ..
            } => {
                assert!(fallback);
                assert_eq!(*scheduled_time, tuesday(9, 0));
            }
            other => panic!("expected a fallback placement, got {other:?}"),
        }
    }

    #[test]
    fn test_no_work_days_is_a_failed_outcome() {
        let mut prefs = SchedulingPreferences::defaults_for("user-1");
        prefs.work_days = Vec::new();
        let store = MemoryStore::with_prefs(prefs);
        task_with_duration(&store, "Nowhere to go", 30, 1);

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.failed, 1);
        match &summary.results[0].resolution {
            Resolution::Failed { reason } => {
                assert!(reason.contains("No eligible work day"));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_run_records_history_without_notifying() {
        let store = MemoryStore::default();
        let engine = SchedulingEngine::new(&store, &store, &store, &store).with_notifier(&store);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        assert_eq!(summary.total_tasks, 0);
        assert_eq!(store.runs.borrow().len(), 1);
        assert!(store.notifications.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_previews_placements_without_persisting() {
        let store = MemoryStore::default();
        let first = task_with_duration(&store, "First", 60, 1);
        let second = task_with_duration(&store, "Second", 30, 2);

        let engine = SchedulingEngine::new(&store, &store, &store, &store)
            .with_notifier(&store)
            .with_dry_run(true);
        let summary = engine.run_at("user-1", monday(9, 0)).unwrap();

        // The walk is the live one: the second preview stacks behind the
        // first, even though neither was written anywhere.
        assert_eq!(summary.successful, 2);
        assert_eq!(scheduled_start(&summary, 0), monday(9, 0));
        assert_eq!(scheduled_start(&summary, 1), monday(10, 15));

        assert_eq!(store.task(&first).status, TaskStatus::NotStarted);
        assert!(store.task(&second).due_date.is_none());
        assert!(store.events.borrow().is_empty());
        assert!(store.runs.borrow().is_empty());
        assert!(store.notifications.borrow().is_empty());
    }

    #[test]
    fn test_single_task_path_overrides_the_auto_toggles() {
        let mut prefs = SchedulingPreferences::defaults_for("user-1");
        prefs.auto_scheduling_enabled = false;
        let store = MemoryStore::with_prefs(prefs);
        let id = {
            let mut task = Task::new("user-1", "Manual");
            task.estimated_duration_minutes = Some(45);
            task.auto_schedule_enabled = false;
            store.add_task(task)
        };

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.schedule_task_at(&id, monday(9, 0)).unwrap();

        assert_eq!(summary.total_tasks, 1);
        assert_eq!(summary.successful, 1);
        assert_eq!(scheduled_start(&summary, 0), monday(9, 0));
        assert_eq!(store.task(&id).status, TaskStatus::InProgress);
    }

    #[test]
    fn test_single_task_path_rejects_unknown_ids() {
        let store = MemoryStore::default();
        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        assert!(engine.schedule_task_at("task-missing", monday(9, 0)).is_err());
    }

    #[test]
    fn test_already_placed_task_is_skipped_by_the_single_path() {
        let store = MemoryStore::default();
        let id = {
            let mut task = Task::new("user-1", "Placed");
            task.status = TaskStatus::InProgress;
            task.due_date = Some(monday(13, 0));
            store.add_task(task)
        };

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let summary = engine.schedule_task_at(&id, monday(9, 0)).unwrap();

        assert_eq!(summary.skipped, 1);
        // The existing placement stands.
        assert_eq!(store.task(&id).due_date, Some(monday(13, 0)));
    }

    #[test]
    fn test_completing_a_recurring_task_reopens_it() {
        let store = MemoryStore::default();
        let id = {
            let mut task = Task::new("user-1", "Water plants");
            task.recurrence_pattern = Some(RecurrencePattern::new(Frequency::Daily, 1));
            task.status = TaskStatus::InProgress;
            task.due_date = Some(monday(18, 0));
            store.add_task(task)
        };

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let outcome = engine.complete_task_at(&id, monday(18, 30)).unwrap();

        assert_eq!(outcome.rescheduled_for, Some(tuesday(18, 30)));
        let reopened = store.task(&id);
        assert_eq!(reopened.status, TaskStatus::NotStarted);
        assert_eq!(reopened.due_date, Some(tuesday(18, 30)));
    }

    #[test]
    fn test_reopening_failure_leaves_the_completion_persisted() {
        let store = MemoryStore::default();
        let id = {
            let mut task = Task::new("user-1", "Water plants");
            task.recurrence_pattern = Some(RecurrencePattern::new(Frequency::Daily, 1));
            store.add_task(task)
        };
        // The completion write succeeds; the reopening write fails.
        store.fail_updates_after.set(Some(1));

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        assert!(engine.complete_task_at(&id, monday(18, 0)).is_err());

        let task = store.task(&id);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.updated_at, monday(18, 0));
    }

    #[test]
    fn test_completing_a_plain_task_is_terminal() {
        let store = MemoryStore::default();
        let id = store.add_task(Task::new("user-1", "One-off"));

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        let outcome = engine.complete_task_at(&id, monday(18, 0)).unwrap();

        assert!(outcome.rescheduled_for.is_none());
        assert_eq!(store.task(&id).status, TaskStatus::Completed);
    }

    #[test]
    fn test_completing_twice_changes_nothing() {
        let store = MemoryStore::default();
        let id = store.add_task(Task::new("user-1", "One-off"));

        let engine = SchedulingEngine::new(&store, &store, &store, &store);
        engine.complete_task_at(&id, monday(18, 0)).unwrap();
        let again = engine.complete_task_at(&id, tuesday(9, 0)).unwrap();

        assert!(again.rescheduled_for.is_none());
        let task = store.task(&id);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.updated_at, monday(18, 0));
    }

    #[test]
    fn test_run_summary_serializes_with_flattened_outcomes() {
        let summary = RunSummary {
            message: "Scheduled 1 of 2 tasks (0 failed, 1 skipped)".to_string(),
            results: vec![
                TaskOutcome {
                    task_id: "task-1".to_string(),
                    task_title: "Write report".to_string(),
                    resolution: Resolution::Scheduled {
                        scheduled_time: monday(11, 15),
                        calendar_event_id: None,
                        travel_minutes: Some(10),
                        fallback: false,
                    },
                },
                TaskOutcome {
                    task_id: "task-2".to_string(),
                    task_title: "Trim the hedge".to_string(),
                    resolution: Resolution::Skipped {
                        reason: "Weather unsuitable for outdoor task: rain".to_string(),
                    },
                },
            ],
            total_tasks: 2,
            successful: 1,
            failed: 0,
            skipped: 1,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["results"][0]["status"], "scheduled");
        assert_eq!(json["results"][0]["task_id"], "task-1");
        assert_eq!(json["results"][0]["travel_minutes"], 10);
        assert_eq!(json["results"][0]["fallback"], false);
        // An absent event id is omitted rather than serialized as null.
        assert!(json["results"][0].get("calendar_event_id").is_none());
        assert_eq!(json["results"][1]["status"], "skipped");

        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}

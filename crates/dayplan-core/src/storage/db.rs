//! SQLite-based storage for tasks, preferences, events, runs, and
//! notifications.

use std::path::Path;

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use super::data_dir;
use crate::calendar::CalendarEvent;
use crate::error::{DatabaseError, Result};
use crate::preferences::SchedulingPreferences;
use crate::scheduler::{RunRecord, RunSummary, TaskOutcome};
use crate::services::NotificationService;
use crate::stores::{CalendarStore, HistoryStore, PreferenceStore, TaskStore};
use crate::task::{Task, TaskPriority, TaskStatus};

// === Helper Functions ===

/// Parse task status from database string
fn parse_task_status(status_str: &str) -> TaskStatus {
    match status_str {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        _ => TaskStatus::NotStarted,
    }
}

/// Format task status for database storage
fn format_task_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "not_started",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
    }
}

/// Parse task priority from database string
fn parse_priority(priority_str: &str) -> TaskPriority {
    match priority_str {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        _ => TaskPriority::Medium,
    }
}

/// Format task priority for database storage
fn format_priority(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
    }
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse optional datetime from RFC3339 string
fn parse_datetime_opt(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse wall-clock time from "HH:MM:SS" with a fallback
fn parse_time_or(time_str: &str, fallback: NaiveTime) -> NaiveTime {
    NaiveTime::parse_from_str(time_str, "%H:%M:%S").unwrap_or(fallback)
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

const TASK_COLUMNS: &str = "id, user_id, title, description, estimated_duration_minutes, \
     priority, due_date, status, auto_schedule_enabled, weather_dependent, \
     location, preferred_time_windows, recurrence_pattern, travel_time_minutes, \
     last_scheduled_date, created_at, updated_at";

/// Build a Task from a database row (column order per `TASK_COLUMNS`)
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let priority_str: String = row.get(5)?;
    let status_str: String = row.get(7)?;

    let windows_json: String = row.get(11)?;
    let preferred_time_windows: Vec<String> =
        serde_json::from_str(&windows_json).unwrap_or_default();

    let recurrence_json: Option<String> = row.get(12)?;
    let recurrence_pattern = recurrence_json.and_then(|s| serde_json::from_str(&s).ok());

    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        estimated_duration_minutes: row.get(4)?,
        priority: parse_priority(&priority_str),
        due_date: parse_datetime_opt(row.get(6)?),
        status: parse_task_status(&status_str),
        auto_schedule_enabled: row.get(8)?,
        weather_dependent: row.get(9)?,
        location: row.get(10)?,
        preferred_time_windows,
        recurrence_pattern,
        travel_time_minutes: row.get(13)?,
        last_scheduled_date: parse_datetime_opt(row.get(14)?),
        created_at: parse_datetime_fallback(&row.get::<_, String>(15)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(16)?),
    })
}

/// Build a CalendarEvent from a database row
fn row_to_event(row: &rusqlite::Row) -> Result<CalendarEvent, rusqlite::Error> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: parse_datetime_fallback(&row.get::<_, String>(4)?),
        end_time: parse_datetime_fallback(&row.get::<_, String>(5)?),
        location: row.get(6)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(7)?),
    })
}

/// Build a RunRecord from a database row
fn row_to_run_record(row: &rusqlite::Row) -> Result<RunRecord, rusqlite::Error> {
    let results_json: String = row.get(8)?;
    let results: Vec<TaskOutcome> = serde_json::from_str(&results_json).unwrap_or_default();

    Ok(RunRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        run_at: parse_datetime_fallback(&row.get::<_, String>(2)?),
        summary: RunSummary {
            total_tasks: row.get(3)?,
            successful: row.get(4)?,
            failed: row.get(5)?,
            skipped: row.get(6)?,
            message: row.get(7)?,
            results,
        },
    })
}

/// An in-app notification record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite database backing the scheduler.
///
/// Owns the tasks, scheduling_preferences, calendar_events,
/// scheduling_history, and notifications tables, and implements every
/// storage seam the engine consumes.
pub struct SchedulerDb {
    conn: Connection,
}

impl SchedulerDb {
    /// Open the database at `~/.config/dayplan/dayplan.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("dayplan.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id                         TEXT PRIMARY KEY,
                    user_id                    TEXT NOT NULL,
                    title                      TEXT NOT NULL,
                    description                TEXT,
                    estimated_duration_minutes INTEGER,
                    priority                   TEXT NOT NULL DEFAULT 'medium',
                    due_date                   TEXT,
                    status                     TEXT NOT NULL DEFAULT 'not_started',
                    auto_schedule_enabled      INTEGER NOT NULL DEFAULT 0,
                    weather_dependent          INTEGER NOT NULL DEFAULT 0,
                    location                   TEXT,
                    preferred_time_windows     TEXT NOT NULL DEFAULT '[]',
                    recurrence_pattern         TEXT,
                    travel_time_minutes        INTEGER,
                    last_scheduled_date        TEXT,
                    created_at                 TEXT NOT NULL,
                    updated_at                 TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS scheduling_preferences (
                    user_id                 TEXT PRIMARY KEY,
                    preferred_start_time    TEXT NOT NULL DEFAULT '09:00:00',
                    preferred_end_time      TEXT NOT NULL DEFAULT '17:00:00',
                    work_days               TEXT NOT NULL DEFAULT '[1,2,3,4,5]',
                    max_tasks_per_day       INTEGER NOT NULL DEFAULT 5,
                    buffer_time_minutes     INTEGER NOT NULL DEFAULT 15,
                    weather_check_enabled   INTEGER NOT NULL DEFAULT 1,
                    travel_time_enabled     INTEGER NOT NULL DEFAULT 1,
                    auto_scheduling_enabled INTEGER NOT NULL DEFAULT 1,
                    timezone                TEXT NOT NULL DEFAULT 'UTC'
                );

                CREATE TABLE IF NOT EXISTS calendar_events (
                    id         TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    title      TEXT NOT NULL,
                    description TEXT,
                    start_time TEXT NOT NULL,
                    end_time   TEXT NOT NULL,
                    location   TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS scheduling_history (
                    id          TEXT PRIMARY KEY,
                    user_id     TEXT NOT NULL,
                    run_at      TEXT NOT NULL,
                    total_tasks INTEGER NOT NULL,
                    successful  INTEGER NOT NULL,
                    failed      INTEGER NOT NULL,
                    skipped     INTEGER NOT NULL,
                    message     TEXT NOT NULL,
                    results     TEXT NOT NULL DEFAULT '[]'
                );

                CREATE TABLE IF NOT EXISTS notifications (
                    id         TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    title      TEXT NOT NULL,
                    body       TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_user_status
                    ON tasks(user_id, status);
                CREATE INDEX IF NOT EXISTS idx_events_user_start
                    ON calendar_events(user_id, start_time);
                CREATE INDEX IF NOT EXISTS idx_history_user_run_at
                    ON scheduling_history(user_id, run_at);",
            )
            .map_err(|err| DatabaseError::MigrationFailed(err.to_string()))?;
        Ok(())
    }

    // === Task CRUD ===

    /// Create a new task.
    pub fn create_task(&self, task: &Task) -> Result<()> {
        let windows_json = serde_json::to_string(&task.preferred_time_windows).unwrap();
        let recurrence_json = task
            .recurrence_pattern
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap());

        self.conn.execute(
            "INSERT INTO tasks (
                id, user_id, title, description, estimated_duration_minutes,
                priority, due_date, status, auto_schedule_enabled, weather_dependent,
                location, preferred_time_windows, recurrence_pattern, travel_time_minutes,
                last_scheduled_date, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                task.id,
                task.user_id,
                task.title,
                task.description,
                task.estimated_duration_minutes,
                format_priority(task.priority),
                task.due_date.map(|dt| dt.to_rfc3339()),
                format_task_status(task.status),
                task.auto_schedule_enabled,
                task.weather_dependent,
                task.location,
                windows_json,
                recurrence_json,
                task.travel_time_minutes,
                task.last_scheduled_date.map(|dt| dt.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;

        let result = stmt.query_row(params![id], row_to_task);
        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all tasks for a user, newest first.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let tasks = stmt.query_map(params![user_id], row_to_task)?;
        Ok(tasks.collect::<Result<Vec<Task>, rusqlite::Error>>()?)
    }

    /// Delete a task.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn store_task_update(&self, task: &Task) -> Result<()> {
        let windows_json = serde_json::to_string(&task.preferred_time_windows).unwrap();
        let recurrence_json = task
            .recurrence_pattern
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap());

        self.conn.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, estimated_duration_minutes = ?3,
                 priority = ?4, due_date = ?5, status = ?6, auto_schedule_enabled = ?7,
                 weather_dependent = ?8, location = ?9, preferred_time_windows = ?10,
                 recurrence_pattern = ?11, travel_time_minutes = ?12,
                 last_scheduled_date = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                task.title,
                task.description,
                task.estimated_duration_minutes,
                format_priority(task.priority),
                task.due_date.map(|dt| dt.to_rfc3339()),
                format_task_status(task.status),
                task.auto_schedule_enabled,
                task.weather_dependent,
                task.location,
                windows_json,
                recurrence_json,
                task.travel_time_minutes,
                task.last_scheduled_date.map(|dt| dt.to_rfc3339()),
                task.updated_at.to_rfc3339(),
                task.id,
            ],
        )?;
        Ok(())
    }

    // === Preferences ===

    /// Get saved preferences for a user, if any.
    pub fn get_preferences(&self, user_id: &str) -> Result<Option<SchedulingPreferences>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, preferred_start_time, preferred_end_time, work_days,
                    max_tasks_per_day, buffer_time_minutes, weather_check_enabled,
                    travel_time_enabled, auto_scheduling_enabled, timezone
             FROM scheduling_preferences WHERE user_id = ?1",
        )?;

        let result = stmt.query_row(params![user_id], |row| {
            let user_id: String = row.get(0)?;
            let mut prefs = SchedulingPreferences::defaults_for(user_id);

            let start_str: String = row.get(1)?;
            prefs.preferred_start_time = parse_time_or(&start_str, prefs.preferred_start_time);
            let end_str: String = row.get(2)?;
            prefs.preferred_end_time = parse_time_or(&end_str, prefs.preferred_end_time);

            let work_days_json: String = row.get(3)?;
            if let Ok(days) = serde_json::from_str::<Vec<u8>>(&work_days_json) {
                prefs.work_days = days;
            }

            prefs.max_tasks_per_day = row.get(4)?;
            prefs.buffer_time_minutes = row.get(5)?;
            prefs.weather_check_enabled = row.get(6)?;
            prefs.travel_time_enabled = row.get(7)?;
            prefs.auto_scheduling_enabled = row.get(8)?;
            prefs.timezone = row.get(9)?;
            Ok(prefs)
        });

        match result {
            Ok(prefs) => Ok(Some(prefs)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store_preferences(&self, prefs: &SchedulingPreferences) -> Result<()> {
        let work_days_json = serde_json::to_string(&prefs.work_days).unwrap();
        self.conn.execute(
            "INSERT OR REPLACE INTO scheduling_preferences (
                user_id, preferred_start_time, preferred_end_time, work_days,
                max_tasks_per_day, buffer_time_minutes, weather_check_enabled,
                travel_time_enabled, auto_scheduling_enabled, timezone
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                prefs.user_id,
                format_time(prefs.preferred_start_time),
                format_time(prefs.preferred_end_time),
                work_days_json,
                prefs.max_tasks_per_day,
                prefs.buffer_time_minutes,
                prefs.weather_check_enabled,
                prefs.travel_time_enabled,
                prefs.auto_scheduling_enabled,
                prefs.timezone,
            ],
        )?;
        Ok(())
    }

    // === Calendar events ===

    /// List all events for a user in start order.
    pub fn list_events(&self, user_id: &str) -> Result<Vec<CalendarEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, description, start_time, end_time, location, created_at
             FROM calendar_events WHERE user_id = ?1 ORDER BY start_time ASC",
        )?;
        let events = stmt.query_map(params![user_id], row_to_event)?;
        Ok(events.collect::<Result<Vec<CalendarEvent>, rusqlite::Error>>()?)
    }

    fn store_event(&self, event: &CalendarEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO calendar_events (
                id, user_id, title, description, start_time, end_time, location, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.user_id,
                event.title,
                event.description,
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                event.location,
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // === Notifications ===

    /// List notifications for a user, newest first.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, body, created_at
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Notification {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                body: row.get(3)?,
                created_at: parse_datetime_fallback(&row.get::<_, String>(4)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<Notification>, rusqlite::Error>>()?)
    }
}

impl TaskStore for SchedulerDb {
    fn task_by_id(&self, id: &str) -> Result<Option<Task>> {
        self.get_task(id)
    }

    fn eligible_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1
               AND auto_schedule_enabled = 1
               AND status = 'not_started'
             ORDER BY CASE priority
                        WHEN 'high' THEN 0
                        WHEN 'medium' THEN 1
                        ELSE 2
                      END ASC,
                      created_at ASC"
        ))?;
        let tasks = stmt.query_map(params![user_id], row_to_task)?;
        Ok(tasks.collect::<Result<Vec<Task>, rusqlite::Error>>()?)
    }

    fn scheduled_tasks_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        // Tasks still awaiting placement are excluded: they are about to be
        // (re)placed and must not block themselves.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1
               AND due_date IS NOT NULL
               AND due_date >= ?2
               AND due_date < ?3
               AND status != 'completed'
               AND NOT (auto_schedule_enabled = 1 AND status = 'not_started')
             ORDER BY due_date ASC"
        ))?;
        let tasks = stmt.query_map(
            params![user_id, from.to_rfc3339(), to.to_rfc3339()],
            row_to_task,
        )?;
        Ok(tasks.collect::<Result<Vec<Task>, rusqlite::Error>>()?)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        self.store_task_update(task)
    }
}

impl PreferenceStore for SchedulerDb {
    fn preferences_for(&self, user_id: &str) -> Result<SchedulingPreferences> {
        if let Some(prefs) = self.get_preferences(user_id)? {
            return Ok(prefs);
        }
        // First sight of this user: persist the defaults so every later
        // read and edit works against one row.
        let defaults = SchedulingPreferences::defaults_for(user_id);
        self.store_preferences(&defaults)?;
        Ok(defaults)
    }

    fn save_preferences(&self, prefs: &SchedulingPreferences) -> Result<()> {
        self.store_preferences(prefs)
    }
}

impl CalendarStore for SchedulerDb {
    fn events_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, description, start_time, end_time, location, created_at
             FROM calendar_events
             WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
             ORDER BY start_time ASC",
        )?;
        let events = stmt.query_map(
            params![user_id, from.to_rfc3339(), to.to_rfc3339()],
            row_to_event,
        )?;
        Ok(events.collect::<Result<Vec<CalendarEvent>, rusqlite::Error>>()?)
    }

    fn create_event(&self, event: &CalendarEvent) -> Result<()> {
        self.store_event(event)
    }
}

impl HistoryStore for SchedulerDb {
    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let results_json = serde_json::to_string(&record.summary.results)?;
        self.conn.execute(
            "INSERT INTO scheduling_history (
                id, user_id, run_at, total_tasks, successful, failed, skipped, message, results
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.user_id,
                record.run_at.to_rfc3339(),
                record.summary.total_tasks,
                record.summary.successful,
                record.summary.failed,
                record.summary.skipped,
                record.summary.message,
                results_json,
            ],
        )?;
        Ok(())
    }

    fn recent_runs(&self, user_id: &str, limit: u32) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, run_at, total_tasks, successful, failed, skipped, message, results
             FROM scheduling_history
             WHERE user_id = ?1
             ORDER BY run_at DESC
             LIMIT ?2",
        )?;
        let runs = stmt.query_map(params![user_id, limit], row_to_run_record)?;
        Ok(runs.collect::<Result<Vec<RunRecord>, rusqlite::Error>>()?)
    }
}

impl NotificationService for SchedulerDb {
    fn notify(&self, user_id: &str, title: &str, body: &str) -> Result<()> {
        let now = Utc::now();
        let id = format!("notif-{}-{}", now.timestamp(), uuid::Uuid::new_v4());
        self.conn.execute(
            "INSERT INTO notifications (id, user_id, title, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, title, body, now.to_rfc3339()],
        )?;
        Ok(())
    }
}

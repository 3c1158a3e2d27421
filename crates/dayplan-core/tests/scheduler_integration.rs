//! End-to-end scheduling runs against a real SQLite database.
//!
//! The unit tests exercise the engine against in-memory fakes; these tests
//! plug every seam into `SchedulerDb` and check that placements, calendar
//! events, run history and notifications all land in storage.

use chrono::{DateTime, Duration, TimeZone, Utc};
use dayplan_core::{
    CalendarEvent, CalendarStore, Frequency, HistoryStore, PreferenceStore, RecurrencePattern,
    Resolution, SchedulerDb, SchedulingEngine, SchedulingPreferences, Task, TaskPriority,
    TaskStatus, TaskStore,
};

const USER: &str = "local";

/// 2025-06-02 is a Monday; default preferences make it a work day.
fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
}

fn seeded_db() -> SchedulerDb {
    let db = SchedulerDb::open_memory().unwrap();
    db.save_preferences(&SchedulingPreferences::defaults_for(USER))
        .unwrap();
    db
}

/// Create a task with a deterministic creation time so eligibility ordering
/// is stable across test runs.
fn seed_task(db: &SchedulerDb, title: &str, minutes: u32, order: u32) -> Task {
    let mut task = Task::new(USER, title);
    task.estimated_duration_minutes = Some(minutes);
    task.created_at = monday(0, order);
    task.updated_at = task.created_at;
    db.create_task(&task).unwrap();
    task
}

#[test]
fn test_full_run_places_tasks_into_free_slots_and_persists() {
    let db = seeded_db();

    // Monday standup occupies 9:00-10:00.
    let standup = CalendarEvent::new(USER, "Standup", monday(9, 0), monday(10, 0)).unwrap();
    db.create_event(&standup).unwrap();

    let mut report = seed_task(&db, "Write report", 60, 0);
    report.priority = TaskPriority::High;
    db.update_task(&report).unwrap();
    let emails = seed_task(&db, "Email sweep", 30, 1);

    let engine = SchedulingEngine::new(&db, &db, &db, &db).with_notifier(&db);
    let summary = engine.run_at(USER, monday(8, 0)).unwrap();

    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.message, "Scheduled 2 of 2 tasks (0 failed, 0 skipped)");

    // High priority goes first: after the standup plus the 15 minute
    // buffer, then the second task after the first placement.
    let report = db.get_task(&report.id).unwrap().unwrap();
    assert_eq!(report.status, TaskStatus::InProgress);
    assert_eq!(report.due_date, Some(monday(10, 15)));
    assert_eq!(report.last_scheduled_date, Some(monday(8, 0)));

    let emails = db.get_task(&emails.id).unwrap().unwrap();
    assert_eq!(emails.status, TaskStatus::InProgress);
    assert_eq!(emails.due_date, Some(monday(11, 30)));

    // Each placement blocked its slot on the calendar.
    let events = db.list_events(USER).unwrap();
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Standup", "Write report", "Email sweep"]);
    assert_eq!(events[1].start_time, monday(10, 15));
    assert_eq!(events[1].end_time, monday(11, 15));

    // The run is in history and the user was notified.
    let runs = db.recent_runs(USER, 10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_at, monday(8, 0));
    assert_eq!(runs[0].summary, summary);

    let notifications = db.list_notifications(USER).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Auto-scheduling complete");
    assert_eq!(notifications[0].body, summary.message);
}

#[test]
fn test_second_run_schedules_around_earlier_placements() {
    let db = seeded_db();
    let first = seed_task(&db, "Morning deep work", 60, 0);

    let engine = SchedulingEngine::new(&db, &db, &db, &db);
    engine.run_at(USER, monday(8, 0)).unwrap();

    let first = db.get_task(&first.id).unwrap().unwrap();
    assert_eq!(first.due_date, Some(monday(9, 0)));

    // A later run must read the placement (and its calendar event) back
    // out of the database and route the new task around it.
    let second = seed_task(&db, "Afternoon errand", 45, 1);
    let summary = engine.run_at(USER, monday(8, 30)).unwrap();
    assert_eq!(summary.successful, 1);

    let second = db.get_task(&second.id).unwrap().unwrap();
    assert_eq!(second.due_date, Some(monday(10, 15)));

    let runs = db.recent_runs(USER, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_at, monday(8, 30));
    assert_eq!(runs[1].run_at, monday(8, 0));
}

#[test]
fn test_explicit_single_task_request_overrides_the_toggles() {
    let db = SchedulerDb::open_memory().unwrap();
    let mut prefs = SchedulingPreferences::defaults_for(USER);
    prefs.auto_scheduling_enabled = false;
    db.save_preferences(&prefs).unwrap();

    let mut errand = seed_task(&db, "Pick up package", 30, 0);
    errand.auto_schedule_enabled = false;
    db.update_task(&errand).unwrap();

    let engine = SchedulingEngine::new(&db, &db, &db, &db);
    let summary = engine.schedule_task_at(&errand.id, monday(8, 0)).unwrap();

    assert_eq!(summary.successful, 1);
    match &summary.results[0].resolution {
        Resolution::Scheduled { scheduled_time, .. } => {
            assert_eq!(*scheduled_time, monday(9, 0));
        }
        other => panic!("expected a placement, got {other:?}"),
    }

    let errand = db.get_task(&errand.id).unwrap().unwrap();
    assert_eq!(errand.status, TaskStatus::InProgress);
    assert_eq!(errand.due_date, Some(monday(9, 0)));
}

#[test]
fn test_completing_a_recurring_task_reopens_it_in_storage() {
    let db = seeded_db();
    let mut watering = seed_task(&db, "Water plants", 15, 0);
    watering.recurrence_pattern = Some(RecurrencePattern::new(Frequency::Daily, 1));
    db.update_task(&watering).unwrap();

    let engine = SchedulingEngine::new(&db, &db, &db, &db);
    let done_at = monday(18, 30);
    let outcome = engine.complete_task_at(&watering.id, done_at).unwrap();

    assert_eq!(outcome.rescheduled_for, Some(done_at + Duration::days(1)));

    let watering = db.get_task(&watering.id).unwrap().unwrap();
    assert_eq!(watering.status, TaskStatus::NotStarted);
    assert_eq!(watering.due_date, Some(done_at + Duration::days(1)));
    assert_eq!(watering.last_scheduled_date, Some(done_at));
}

#[test]
fn test_disabled_auto_scheduling_leaves_the_database_untouched() {
    let db = SchedulerDb::open_memory().unwrap();
    let mut prefs = SchedulingPreferences::defaults_for(USER);
    prefs.auto_scheduling_enabled = false;
    db.save_preferences(&prefs).unwrap();

    let task = seed_task(&db, "Waiting task", 30, 0);

    let engine = SchedulingEngine::new(&db, &db, &db, &db).with_notifier(&db);
    let summary = engine.run_at(USER, monday(8, 0)).unwrap();

    assert_eq!(summary.total_tasks, 0);
    assert_eq!(summary.message, "Auto-scheduling is disabled");

    let task = db.get_task(&task.id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::NotStarted);
    assert!(task.due_date.is_none());
    assert!(db.recent_runs(USER, 10).unwrap().is_empty());
    assert!(db.list_notifications(USER).unwrap().is_empty());
    assert!(db.list_events(USER).unwrap().is_empty());
}

//! Task management commands for CLI.

use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;
use dayplan_core::{
    Frequency, RecurrencePattern, SchedulingEngine, Task, TaskPriority, TaskStatus, TaskStore,
};

use super::{parse_instant, resolve_user};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Estimated duration in minutes (default: 60 at scheduling time)
        #[arg(long)]
        duration: Option<u32>,
        /// Priority: low, medium, or high
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Due date, RFC 3339 (e.g. 2025-06-02T14:00:00Z)
        #[arg(long)]
        due: Option<String>,
        /// Keep the task out of automatic scheduling runs
        #[arg(long)]
        manual: bool,
        /// Only schedule when outdoor weather is suitable
        #[arg(long)]
        weather_dependent: bool,
        /// Location, used for weather and travel-time checks
        #[arg(long)]
        location: Option<String>,
        /// Recurrence: daily, weekly, or monthly
        #[arg(long)]
        recurrence: Option<String>,
        /// Periods between occurrences (default: 1)
        #[arg(long, default_value = "1")]
        recurrence_interval: u32,
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
    /// List tasks
    List {
        /// Filter by status (not_started, in_progress, completed)
        #[arg(long)]
        status: Option<String>,
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New estimated duration in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// New priority: low, medium, or high
        #[arg(long)]
        priority: Option<String>,
        /// New due date, RFC 3339
        #[arg(long)]
        due: Option<String>,
        /// Enable or disable automatic scheduling
        #[arg(long)]
        auto_schedule: Option<bool>,
        /// Enable or disable the weather gate
        #[arg(long)]
        weather_dependent: Option<bool>,
        /// New location
        #[arg(long)]
        location: Option<String>,
    },
    /// Complete a task (recurring tasks are reopened for the next occurrence)
    Complete {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

fn parse_priority(value: &str) -> Result<TaskPriority, Box<dyn std::error::Error>> {
    match value {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        other => Err(format!("unknown priority: {other} (expected low, medium, or high)").into()),
    }
}

fn parse_frequency(value: &str) -> Result<Frequency, Box<dyn std::error::Error>> {
    match value {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        other => {
            Err(format!("unknown recurrence: {other} (expected daily, weekly, or monthly)").into())
        }
    }
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SchedulerDb::open()?;

    match action {
        TaskAction::Create {
            title,
            description,
            duration,
            priority,
            due,
            manual,
            weather_dependent,
            location,
            recurrence,
            recurrence_interval,
            user,
        } => {
            let mut task = Task::new(resolve_user(user), title);
            task.description = description;
            task.estimated_duration_minutes = duration;
            task.priority = parse_priority(&priority)?;
            task.due_date = due.as_deref().map(parse_instant).transpose()?;
            task.auto_schedule_enabled = !manual;
            task.weather_dependent = weather_dependent;
            task.location = location;
            task.recurrence_pattern = recurrence
                .as_deref()
                .map(parse_frequency)
                .transpose()?
                .map(|frequency| RecurrencePattern::new(frequency, recurrence_interval));

            db.create_task(&task)?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { status, user } => {
            let all_tasks = db.list_tasks(&resolve_user(user))?;
            let filtered: Vec<_> = all_tasks
                .into_iter()
                .filter(|task| {
                    if let Some(ref wanted) = status {
                        let task_status = match task.status {
                            TaskStatus::NotStarted => "not_started",
                            TaskStatus::InProgress => "in_progress",
                            TaskStatus::Completed => "completed",
                        };
                        if task_status != wanted.as_str() {
                            return false;
                        }
                    }
                    true
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        TaskAction::Get { id } => match db.get_task(&id)? {
            Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
            None => println!("Task not found: {id}"),
        },
        TaskAction::Update {
            id,
            title,
            description,
            duration,
            priority,
            due,
            auto_schedule,
            weather_dependent,
            location,
        } => {
            let mut task = db.get_task(&id)?.ok_or(format!("Task not found: {id}"))?;

            if let Some(t) = title {
                task.title = t;
            }
            if let Some(d) = description {
                task.description = Some(d);
            }
            if let Some(d) = duration {
                task.estimated_duration_minutes = Some(d);
            }
            if let Some(p) = priority {
                task.priority = parse_priority(&p)?;
            }
            if let Some(d) = due {
                task.due_date = Some(parse_instant(&d)?);
            }
            if let Some(a) = auto_schedule {
                task.auto_schedule_enabled = a;
            }
            if let Some(w) = weather_dependent {
                task.weather_dependent = w;
            }
            if let Some(l) = location {
                task.location = Some(l);
            }
            task.updated_at = chrono::Utc::now();

            db.update_task(&task)?;
            println!("Task updated:");
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Complete { id } => {
            let engine = SchedulingEngine::new(&db, &db, &db, &db);
            let outcome = engine.complete_task(&id)?;
            match outcome.rescheduled_for {
                Some(next) => println!("Task completed; next occurrence due {next}"),
                None => println!("Task completed: {id}"),
            }
            println!("{}", serde_json::to_string_pretty(&outcome.task)?);
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}

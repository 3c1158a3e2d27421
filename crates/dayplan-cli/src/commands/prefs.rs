//! Scheduling preference commands for CLI.

use chrono::NaiveTime;
use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;
use dayplan_core::PreferenceStore;

use super::resolve_user;

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show effective preferences (defaults until saved)
    Show {
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Update preferences; omitted options keep their current value
    Set {
        /// Work-day start, HH:MM
        #[arg(long)]
        start: Option<String>,
        /// Work-day end, HH:MM
        #[arg(long)]
        end: Option<String>,
        /// Comma-separated ISO weekdays, 1=Monday .. 7=Sunday (e.g. "1,2,3,4,5")
        #[arg(long)]
        work_days: Option<String>,
        /// Advisory cap on tasks per day
        #[arg(long)]
        max_tasks_per_day: Option<u32>,
        /// Free minutes required around each placement
        #[arg(long)]
        buffer_minutes: Option<u32>,
        /// Enable or disable the weather gate
        #[arg(long)]
        weather_check: Option<bool>,
        /// Enable or disable travel-time inflation
        #[arg(long)]
        travel_time: Option<bool>,
        /// Enable or disable automatic scheduling runs
        #[arg(long)]
        auto_scheduling: Option<bool>,
        /// IANA timezone name (e.g. "America/New_York")
        #[arg(long)]
        timezone: Option<String>,
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
}

fn parse_time(value: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("invalid time of day: {value} (expected HH:MM)").into())
}

fn parse_work_days(value: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| format!("invalid work days: {value} (expected e.g. \"1,2,3,4,5\")").into())
}

pub fn run(action: PrefsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SchedulerDb::open()?;

    match action {
        PrefsAction::Show { user } => {
            let prefs = db.preferences_for(&resolve_user(user))?;
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
        PrefsAction::Set {
            start,
            end,
            work_days,
            max_tasks_per_day,
            buffer_minutes,
            weather_check,
            travel_time,
            auto_scheduling,
            timezone,
            user,
        } => {
            let mut prefs = db.preferences_for(&resolve_user(user))?;

            if let Some(s) = start {
                prefs.preferred_start_time = parse_time(&s)?;
            }
            if let Some(e) = end {
                prefs.preferred_end_time = parse_time(&e)?;
            }
            if let Some(w) = work_days {
                prefs.work_days = parse_work_days(&w)?;
            }
            if let Some(m) = max_tasks_per_day {
                prefs.max_tasks_per_day = m;
            }
            if let Some(b) = buffer_minutes {
                prefs.buffer_time_minutes = b;
            }
            if let Some(w) = weather_check {
                prefs.weather_check_enabled = w;
            }
            if let Some(t) = travel_time {
                prefs.travel_time_enabled = t;
            }
            if let Some(a) = auto_scheduling {
                prefs.auto_scheduling_enabled = a;
            }
            if let Some(t) = timezone {
                prefs.timezone = t;
            }

            prefs.validate()?;
            db.save_preferences(&prefs)?;
            println!("Preferences updated:");
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
    }
    Ok(())
}

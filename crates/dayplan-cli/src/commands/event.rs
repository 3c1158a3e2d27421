//! Calendar event commands for CLI.

use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;
use dayplan_core::{CalendarEvent, CalendarStore};

use super::{parse_instant, resolve_user};

#[derive(Subcommand)]
pub enum EventAction {
    /// Add a calendar event
    Add {
        /// Event title
        title: String,
        /// Start, RFC 3339 (e.g. 2025-06-02T10:00:00Z)
        start: String,
        /// End, RFC 3339
        end: String,
        /// Event description
        #[arg(long)]
        description: Option<String>,
        /// Event location
        #[arg(long)]
        location: Option<String>,
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
    /// List events
    List {
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SchedulerDb::open()?;

    match action {
        EventAction::Add {
            title,
            start,
            end,
            description,
            location,
            user,
        } => {
            let mut event = CalendarEvent::new(
                resolve_user(user),
                title,
                parse_instant(&start)?,
                parse_instant(&end)?,
            )?;
            event.description = description;
            event.location = location;

            db.create_event(&event)?;
            println!("Event created: {}", event.id);
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        EventAction::List { user } => {
            let events = db.list_events(&resolve_user(user))?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}

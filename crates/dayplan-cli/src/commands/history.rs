//! Scheduling history commands for CLI.

use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;
use dayplan_core::HistoryStore;

use super::resolve_user;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Show recent scheduling runs, newest first
    Show {
        /// Maximum number of runs
        #[arg(long, default_value = "10")]
        limit: u32,
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SchedulerDb::open()?;

    match action {
        HistoryAction::Show { limit, user } => {
            let runs = db.recent_runs(&resolve_user(user), limit)?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }
    Ok(())
}

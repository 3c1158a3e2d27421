//! Notification commands for CLI.

use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;

use super::resolve_user;

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// List notifications, newest first
    List {
        /// Owning user (default: configured user)
        #[arg(long)]
        user: Option<String>,
    },
}

pub fn run(action: NotificationsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SchedulerDb::open()?;

    match action {
        NotificationsAction::List { user } => {
            let notifications = db.list_notifications(&resolve_user(user))?;
            println!("{}", serde_json::to_string_pretty(&notifications)?);
        }
    }
    Ok(())
}

//! Automatic scheduling commands for CLI.

use clap::Subcommand;
use dayplan_core::storage::SchedulerDb;
use dayplan_core::{Config, GraphHopperTravel, OpenMeteoWeather, SchedulingEngine};

use super::resolve_user;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Schedule every eligible task
    Run {
        /// User to schedule for (default: configured user)
        #[arg(long)]
        user: Option<String>,
        /// Preview placements without saving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Schedule one task by ID, regardless of its auto-schedule flag
    Task {
        /// Task ID
        id: String,
    },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = SchedulerDb::open()?;
    let weather = OpenMeteoWeather::new(
        config.services.weather_forecast_url.as_str(),
        config.services.weather_geocode_url.as_str(),
    )?;
    let travel = GraphHopperTravel::new(
        config.services.travel_url.as_str(),
        config.services.travel_api_key.clone(),
    )?;
    let engine = SchedulingEngine::new(&db, &db, &db, &db)
        .with_weather(&weather)
        .with_travel(&travel)
        .with_notifier(&db)
        .with_lookahead_days(i64::from(config.scheduling.lookahead_days));

    let summary = match action {
        ScheduleAction::Run { user, dry_run } => {
            if dry_run {
                println!("Dry run: nothing will be saved");
            }
            engine.with_dry_run(dry_run).run(&resolve_user(user))?
        }
        ScheduleAction::Task { id } => engine.schedule_task(&id)?,
    };

    println!("{}", summary.message);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

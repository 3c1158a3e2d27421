//! # Dayplan Core Library
//!
//! This library provides the scheduling logic for Dayplan, a personal
//! day-planning tool that places open tasks into free calendar slots.
//! It implements a CLI-first philosophy: every operation is available
//! through the standalone CLI binary, which is a thin layer over this
//! crate.
//!
//! ## Architecture
//!
//! - **Slot Finder**: a pure first-fit search over sorted commitments,
//!   scanning work days in the user's timezone
//! - **Commitment Aggregation**: merges calendar events, scheduled tasks,
//!   and placements made earlier in the same run into one busy list
//! - **Scheduling Engine**: per-task weather gating, travel-time
//!   inflation, placement, and persistence, with per-task failure
//!   isolation
//! - **Storage**: SQLite task/preference/event/history persistence and
//!   TOML-based configuration
//! - **Services**: weather and travel-time providers behind small traits
//!
//! ## Key Components
//!
//! - [`SchedulingEngine`]: the scheduling run orchestrator
//! - [`SchedulerDb`]: persistence for tasks, preferences, events, runs
//! - [`Config`]: application configuration management
//! - [`find_slot`]: the first-fit slot finder

pub mod interval;
pub mod task;
pub mod recurrence;
pub mod preferences;
pub mod calendar;
pub mod slot;
pub mod commitments;
pub mod stores;
pub mod services;
pub mod scheduler;
pub mod storage;
pub mod error;

pub use interval::{Interval, IntervalSource};
pub use task::{Task, TaskPriority, TaskStatus};
pub use recurrence::{Frequency, RecurrencePattern};
pub use preferences::SchedulingPreferences;
pub use calendar::CalendarEvent;
pub use slot::{find_slot, Slot, SlotConstraints, SlotOutcome};
pub use commitments::CommitmentAggregator;
pub use stores::{CalendarStore, HistoryStore, PreferenceStore, TaskStore};
pub use services::{
    NotificationService, TravelEstimate, TravelMode, TravelTimeService, WeatherReport,
    WeatherService,
};
pub use services::travel::GraphHopperTravel;
pub use services::weather::OpenMeteoWeather;
pub use scheduler::{
    CompletionOutcome, Resolution, RunRecord, RunSummary, SchedulingEngine, TaskOutcome,
};
pub use storage::{Config, SchedulerDb};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};

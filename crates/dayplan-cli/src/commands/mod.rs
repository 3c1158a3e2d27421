pub mod config;
pub mod event;
pub mod history;
pub mod notifications;
pub mod prefs;
pub mod schedule;
pub mod task;

use chrono::{DateTime, Utc};
use dayplan_core::Config;

/// Resolve the target user: an explicit flag wins, then the configured
/// default.
pub(crate) fn resolve_user(user: Option<String>) -> String {
    user.unwrap_or_else(|| Config::load_or_default().scheduling.default_user)
}

/// Parse an RFC 3339 instant like `2025-06-02T14:00:00Z`.
pub(crate) fn parse_instant(value: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

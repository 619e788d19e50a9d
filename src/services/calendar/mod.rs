pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One occupied range reported by the calendar backend, in UTC, half-open.
#[derive(Debug, Clone, Deserialize)]
pub struct BusyPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Busy ranges between `from` and `to` for the configured calendar.
    async fn busy_periods(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>>;

    /// Creates a standard-length appointment starting at `start`.
    async fn create_event(
        &self,
        summary: &str,
        description: &str,
        start: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

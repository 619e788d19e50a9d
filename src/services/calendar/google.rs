use std::collections::HashMap;
use std::time::Duration as StdDuration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

use super::{BusyPeriod, CalendarProvider};
use crate::models::SLOT_MINUTES;

const FREEBUSY_URL: &str = "https://www.googleapis.com/calendar/v3/freeBusy";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars";
const REQUEST_TIMEOUT_SECS: u64 = 5;

pub struct GoogleCalendarProvider {
    token: String,
    calendar_id: String,
    client: reqwest::Client,
}

impl GoogleCalendarProvider {
    pub fn new(token: String, calendar_id: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build calendar HTTP client")?;
        Ok(Self { token, calendar_id, client })
    }
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, CalendarBusy>,
}

#[derive(Deserialize, Default)]
struct CalendarBusy {
    #[serde(default)]
    busy: Vec<BusyPeriod>,
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn busy_periods(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        let body = serde_json::json!({
            "timeMin": rfc3339(from),
            "timeMax": rfc3339(to),
            "timeZone": "UTC",
            "items": [{ "id": self.calendar_id }],
        });

        let response = self
            .client
            .post(FREEBUSY_URL)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Failed to call calendar free/busy API")?
            .error_for_status()
            .context("Calendar free/busy API returned an error")?;

        let data: FreeBusyResponse = response
            .json()
            .await
            .context("Failed to parse free/busy response")?;

        Ok(data
            .calendars
            .get(&self.calendar_id)
            .map(|c| c.busy.clone())
            .unwrap_or_default())
    }

    async fn create_event(
        &self,
        summary: &str,
        description: &str,
        start: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let end = start + Duration::minutes(SLOT_MINUTES);
        // calendar ids are email-shaped and need the "@" escaped in the path
        let url = format!("{EVENTS_URL}/{}/events", self.calendar_id.replace('@', "%40"));
        let body = serde_json::json!({
            "summary": summary,
            "description": description,
            "start": { "dateTime": rfc3339(start), "timeZone": "UTC" },
            "end": { "dateTime": rfc3339(end), "timeZone": "UTC" },
        });

        self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Failed to call calendar events API")?
            .error_for_status()
            .context("Calendar events API returned an error")?;

        tracing::info!(start = %rfc3339(start), "calendar event created");
        Ok(())
    }
}

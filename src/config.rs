use std::env;

use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub business_name: String,
    pub calendar_id: String,
    pub calendar_token: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub business_timezone: Tz,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "our salon".to_string()),
            calendar_id: env::var("CALENDAR_ID").unwrap_or_default(),
            calendar_token: env::var("CALENDAR_TOKEN").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            business_timezone: env::var("BUSINESS_TIMEZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(chrono_tz::Europe::Belgrade),
            business_hours_start: env::var("BUSINESS_HOURS_START")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9),
            business_hours_end: env::var("BUSINESS_HOURS_END")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(17),
        }
    }
}

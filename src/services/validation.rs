use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid name")]
    InvalidName,

    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid date-time")]
    InvalidDateTime,
}

/// Names are words of alphabetic characters separated by single spaces.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName);
    }
    let valid = name
        .split(' ')
        .all(|word| !word.is_empty() && word.chars().all(|c| c.is_alphabetic()));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidName)
    }
}

/// Minimal structural check: one "@" with a non-empty local part and a
/// domain containing a dot. Not an exhaustive RFC validator.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(ValidationError::InvalidEmail);
    };
    if host.is_empty() || tld.is_empty() {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Parses a user-supplied date-time into a timestamp in the business
/// timezone. Accepted forms:
///
/// - ISO-8601 with offset ("2030-06-17T14:00:00+02:00")
/// - "2030-06-17 14:00" and "2030-06-17T14:00:00"
/// - "today"/"tomorrow"/"2030-06-17" followed by "at <time>"
/// - bare times, resolved to today: "1 pm", "13:30", "10h"
///
/// Anything else, and any result not in the future, is `InvalidDateTime`;
/// ambiguous input is re-prompted, never guessed at.
pub fn validate_datetime(input: &str, now: DateTime<Tz>) -> Result<NaiveDateTime, ValidationError> {
    let parsed = parse_datetime(input.trim(), now).ok_or(ValidationError::InvalidDateTime)?;
    if parsed <= now.naive_local() {
        return Err(ValidationError::InvalidDateTime);
    }
    Ok(parsed)
}

fn parse_datetime(s: &str, now: DateTime<Tz>) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&now.timezone()).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let lowered = s.to_lowercase();
    let (date_part, time_part) = match lowered.split_once(" at ") {
        Some((date, time)) => (Some(date.trim()), time.trim()),
        None => (None, lowered.as_str()),
    };

    let (hour, minute) = parse_time_of_day(time_part)?;
    let date = match date_part {
        None | Some("today") => now.date_naive(),
        Some("tomorrow") => now.date_naive() + Duration::days(1),
        Some(other) => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok()?,
    };
    date.and_hms_opt(hour, minute, 0)
}

/// Time-of-day forms: "1 pm", "1:30pm", "14:30", and the European bare-hour
/// style "10h". A bare "10h" means 10:00, never a noon default.
fn parse_time_of_day(s: &str) -> Option<(u32, u32)> {
    let s = s.trim().strip_prefix("at ").unwrap_or(s).trim();

    if let Some(rest) = s.strip_suffix("pm").or_else(|| s.strip_suffix("p.m.")) {
        let (hour, minute) = parse_hour_minute(rest.trim())?;
        if !(1..=12).contains(&hour) || minute > 59 {
            return None;
        }
        return Some((if hour == 12 { 12 } else { hour + 12 }, minute));
    }
    if let Some(rest) = s.strip_suffix("am").or_else(|| s.strip_suffix("a.m.")) {
        let (hour, minute) = parse_hour_minute(rest.trim())?;
        if !(1..=12).contains(&hour) || minute > 59 {
            return None;
        }
        return Some((if hour == 12 { 0 } else { hour }, minute));
    }
    if let Some(rest) = s.strip_suffix('h') {
        let hour: u32 = rest.trim().parse().ok()?;
        if hour > 23 {
            return None;
        }
        return Some((hour, 0));
    }
    if let Some((h, m)) = s.split_once(':') {
        let hour: u32 = h.trim().parse().ok()?;
        let minute: u32 = m.trim().parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        return Some((hour, minute));
    }
    None
}

fn parse_hour_minute(s: &str) -> Option<(u32, u32)> {
    match s.split_once(':') {
        Some((h, m)) => Some((h.trim().parse().ok()?, m.trim().parse().ok()?)),
        None => Some((s.trim().parse().ok()?, 0)),
    }
}

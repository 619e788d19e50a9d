use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Every bookable slot is a fixed half hour.
pub const SLOT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingIntent {
    Schedule,
    Reschedule,
}

impl BookingIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingIntent::Schedule => "schedule",
            BookingIntent::Reschedule => "reschedule",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reschedule" => BookingIntent::Reschedule,
            _ => BookingIntent::Schedule,
        }
    }
}

/// A fully collected and validated appointment, built per webhook call and
/// discarded after the response. Times are in the business timezone.
#[derive(Debug, Clone)]
pub struct AppointmentRequest {
    pub name: String,
    pub email: String,
    pub start: NaiveDateTime,
    pub intent: BookingIntent,
    pub note: Option<String>,
}

impl AppointmentRequest {
    pub fn event_summary(&self) -> String {
        match self.intent {
            BookingIntent::Schedule => format!("Appointment for {}", self.name),
            BookingIntent::Reschedule => format!("Rescheduled appointment for {}", self.name),
        }
    }

    pub fn event_description(&self) -> String {
        match &self.note {
            Some(note) => format!("{}, {}", self.email, note),
            None => self.email.clone(),
        }
    }
}

/// An occupied range on the target calendar, in the business timezone.
/// Half-open: the interval covers [start, end).
#[derive(Debug, Clone, PartialEq)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyInterval {
    pub fn from_utc(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            start: start.with_timezone(&tz).naive_local(),
            end: end.with_timezone(&tz).naive_local(),
        }
    }
}

/// A 30-minute bookable window. Computed, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub start: NaiveDateTime,
}

impl Slot {
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(SLOT_MINUTES)
    }
}

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::models::{BusyInterval, Slot, SLOT_MINUTES};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no slot available")]
pub struct NoSlotAvailable;

/// Opening hours in the business timezone, whole hours, half-open:
/// the last slot of the day ends exactly at `close`.
#[derive(Debug, Clone, Copy)]
pub struct BusinessHours {
    pub open: u32,
    pub close: u32,
}

impl BusinessHours {
    pub fn open_at(&self, date: NaiveDate) -> NaiveDateTime {
        at_hour(date, self.open)
    }

    pub fn close_at(&self, date: NaiveDate) -> NaiveDateTime {
        at_hour(date, self.close)
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_else(|| NaiveDateTime::new(date, NaiveTime::MIN))
}

/// Earliest free slot at or after the requested time, on the requested day.
///
/// Candidates start on half-hour boundaries and advance in 30-minute steps
/// until the end of the slot would pass closing time. A candidate conflicts
/// with a busy interval when the two half-open ranges overlap, so a meeting
/// ending at 14:30 does not block the 14:30 slot.
pub fn find_available_slot(
    requested: NaiveDateTime,
    busy: &[BusyInterval],
    hours: BusinessHours,
) -> Result<Slot, NoSlotAvailable> {
    let close = hours.close_at(requested.date());
    let mut start = round_up_to_half_hour(requested).max(hours.open_at(requested.date()));

    while start + Duration::minutes(SLOT_MINUTES) <= close {
        let end = start + Duration::minutes(SLOT_MINUTES);
        let conflict = busy.iter().any(|b| start < b.end && b.start < end);
        if !conflict {
            return Ok(Slot { start });
        }
        start = end;
    }
    Err(NoSlotAvailable)
}

/// 14:00 stays 14:00, 14:01 through 14:30 become 14:30, 14:31 rolls over
/// to 15:00. Day overflow carries into the next date.
pub fn round_up_to_half_hour(dt: NaiveDateTime) -> NaiveDateTime {
    let carry = u32::from(dt.second() > 0 || dt.nanosecond() > 0);
    let minutes = dt.hour() * 60 + dt.minute() + carry;
    let rounded = minutes.div_ceil(30) * 30;
    NaiveDateTime::new(dt.date(), NaiveTime::MIN) + Duration::minutes(i64::from(rounded))
}

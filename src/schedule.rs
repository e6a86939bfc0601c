use std::fmt::{Debug, Display};

use chrono::{FixedOffset, NaiveTime, Offset, Timelike, Utc};

use crate::primitives::{Millis, DAY_MILLIS};

pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// The local midnight-to-midnight window `[start, end)` containing some instant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayBucket {
    pub start: Millis,
    pub end: Millis,
}

impl DayBucket {
    pub fn containing(instant: Millis, offset: FixedOffset) -> Self {
        let offset_millis = offset.local_minus_utc() as Millis * 1000;
        let local_midnight = (instant + offset_millis).div_euclid(DAY_MILLIS) * DAY_MILLIS;
        let start = local_midnight - offset_millis;
        Self {
            start,
            end: start + DAY_MILLIS,
        }
    }

    pub fn contains(&self, instant: Millis) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn next(&self) -> DayBucket {
        DayBucket {
            start: self.end,
            end: self.end + DAY_MILLIS,
        }
    }
}

impl Debug for DayBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("day[{}..{})", self.start, self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSlotError {
    MissingMeridiem,
    InvalidMeridiem(Box<str>),
    InvalidHour(Box<str>),
    InvalidMinute(Box<str>),
}

impl Display for ParseSlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseSlotError::MissingMeridiem => f.write_str("expected `h:mm AM` or `h:mm PM`"),
            ParseSlotError::InvalidMeridiem(it) => write!(f, "invalid meridiem `{}`", it),
            ParseSlotError::InvalidHour(it) => write!(f, "invalid hour `{}`", it),
            ParseSlotError::InvalidMinute(it) => write!(f, "invalid minute `{}`", it),
        }
    }
}

impl std::error::Error for ParseSlotError {}

/// A bookable departure, labelled the way riders see it (`7:00 AM`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    label: Box<str>,
    time: NaiveTime,
}

impl TimeSlot {
    pub fn parse(label: &str) -> Result<TimeSlot, ParseSlotError> {
        let label = label.trim();
        let (clock, meridiem) = label
            .split_once(' ')
            .ok_or(ParseSlotError::MissingMeridiem)?;
        let (hour, minute) = clock
            .split_once(':')
            .ok_or_else(|| ParseSlotError::InvalidMinute(clock.into()))?;
        let hour = hour
            .parse::<u32>()
            .ok()
            .filter(|h| (1..=12).contains(h))
            .ok_or_else(|| ParseSlotError::InvalidHour(hour.into()))?;
        let minute_value = minute
            .parse::<u32>()
            .ok()
            .filter(|m| *m < 60 && minute.len() == 2)
            .ok_or_else(|| ParseSlotError::InvalidMinute(minute.into()))?;
        let hour = match meridiem.trim().to_ascii_uppercase().as_str() {
            "AM" => hour % 12,
            "PM" => hour % 12 + 12,
            other => return Err(ParseSlotError::InvalidMeridiem(other.into())),
        };
        let time = NaiveTime::from_hms_opt(hour, minute_value, 0)
            .ok_or_else(|| ParseSlotError::InvalidHour(hour.to_string().into()))?;
        Ok(TimeSlot {
            label: label.into(),
            time,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// The next instant at or after `now` whose local time-of-day is this slot. A slot that
    /// already passed today resolves to tomorrow.
    pub fn next_occurrence(&self, now: Millis, offset: FixedOffset) -> Millis {
        let today = DayBucket::containing(now, offset);
        let candidate = today.start + self.time.num_seconds_from_midnight() as Millis * 1000;
        if candidate < now {
            candidate + DAY_MILLIS
        } else {
            candidate
        }
    }
}

impl Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

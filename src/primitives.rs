/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// A number of seats, or of riders occupying them.
pub type Seats = u32;

pub const MINUTE_MILLIS: Millis = 60 * 1000;
pub const DAY_MILLIS: Millis = 24 * 60 * MINUTE_MILLIS;

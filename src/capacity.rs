use log::debug;

use crate::booking::Booking;
use crate::col::{map_new, HashMap};
use crate::config::ServiceConfig;
use crate::primitives::{Millis, Seats};
use crate::route::{Direction, Segment};
use crate::schedule::DayBucket;
use crate::stop::StopId;

/// Riders occupying each segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentLoad {
    load: HashMap<Segment, Seats>,
}

impl SegmentLoad {
    pub fn new() -> Self {
        Self { load: map_new() }
    }

    /// Sums the riders of `bookings` on every segment they traverse.
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let mut load = Self::new();
        for booking in bookings {
            load.add(&booking.segments, booking.riders);
        }
        load
    }

    pub fn add(&mut self, segments: &[Segment], riders: Seats) {
        for segment in segments {
            *self.load.entry(segment.clone()).or_insert(0) += riders;
        }
    }

    pub fn load(&self, segment: &Segment) -> Seats {
        self.load.get(segment).copied().unwrap_or(0)
    }

    /// The load of the busiest of `segments`, zero if there are none.
    pub fn max_over(&self, segments: &[Segment]) -> Seats {
        segments
            .iter()
            .map(|segment| self.load(segment))
            .max()
            .unwrap_or(0)
    }

    /// The first of `segments` that cannot take `riders` more without exceeding `capacity`.
    pub fn first_overflow<'s>(
        &self,
        segments: &'s [Segment],
        riders: Seats,
        capacity: Seats,
    ) -> Option<&'s Segment> {
        segments
            .iter()
            .find(|segment| self.load(segment) + riders > capacity)
    }

    /// The busiest segment overall.
    pub fn peak(&self) -> Option<(&Segment, Seats)> {
        self.load
            .iter()
            .map(|(segment, load)| (segment, *load))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Segment, Seats)> {
        self.load.iter().map(|(segment, load)| (segment, *load))
    }
}

/// Seats left for a candidate trip, plus the load observed on each segment it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatAvailability {
    pub remaining: Seats,
    pub by_segment: HashMap<Segment, Seats>,
}

/// Seats still free from `pickup` to `dropoff` on the departure at `scheduled_at`.
///
/// Only bookings in the same direction and local day that still hold seats count. The trip is
/// bound by its single busiest segment. A pair outside the route has no segments and therefore
/// gets the full capacity.
pub fn remaining_seats<'a>(
    config: &ServiceConfig,
    direction: Direction,
    scheduled_at: Millis,
    pickup: &StopId,
    dropoff: &StopId,
    bookings: impl IntoIterator<Item = &'a Booking>,
) -> SeatAvailability {
    let needed = config.route.segments_between(pickup, dropoff);
    if needed.is_empty() {
        return SeatAvailability {
            remaining: config.capacity,
            by_segment: map_new(),
        };
    }

    let day = DayBucket::containing(scheduled_at, config.utc_offset);
    let mut by_segment: HashMap<Segment, Seats> = map_new();
    for booking in bookings {
        if booking.direction != direction
            || !day.contains(booking.scheduled_at)
            || !booking.status.is_active()
        {
            continue;
        }
        for segment in booking.segments.iter().filter(|it| needed.contains(it)) {
            *by_segment.entry(segment.clone()).or_insert(0) += booking.riders;
        }
    }

    let worst = needed
        .iter()
        .map(|segment| by_segment.get(segment).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);
    let remaining = config.capacity.saturating_sub(worst);
    debug!(
        "{:?} -> {:?} ({}) on {:?}: worst segment load {}, {} seats left",
        pickup, dropoff, direction, day, worst, remaining
    );
    SeatAvailability {
        remaining,
        by_segment,
    }
}

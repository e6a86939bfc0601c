//! Boarding admission when the shuttle reaches a stop.

use log::{debug, error, info, warn};

use crate::booking::{BookingId, BookingStatus};
use crate::capacity::SegmentLoad;
use crate::config::ServiceConfig;
use crate::lifecycle::{apply_transition, LifecycleError};
use crate::primitives::{Millis, Seats};
use crate::priority::BoardingQueue;
use crate::route::Segment;
use crate::schedule::DayBucket;
use crate::stop::StopId;
use crate::store::{BookingStore, StoreError};

/// A pending booking that did not fit and stays pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub booking: BookingId,
    pub riders: Seats,
    /// The first segment that would have overflowed, and its load before this booking.
    pub segment: Segment,
    pub load: Seats,
}

#[derive(Debug)]
pub struct AdmissionReport {
    pub stop: StopId,
    pub day: DayBucket,
    /// Pending and accepted bookings of the day that were ranked.
    pub considered: usize,
    pub admitted: Vec<BookingId>,
    pub rejected: Vec<Rejection>,
    /// Admitted in memory but not persisted. Their seats stay counted for the rest of the pass.
    pub failed: Vec<(BookingId, LifecycleError)>,
    /// Set when the day's bookings could not be read; nothing was decided.
    pub load_error: Option<StoreError>,
}

impl AdmissionReport {
    fn empty(stop: &StopId, day: DayBucket) -> Self {
        Self {
            stop: stop.clone(),
            day,
            considered: 0,
            admitted: Vec::new(),
            rejected: Vec::new(),
            failed: Vec::new(),
            load_error: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.load_error.is_none()
    }
}

/// Admits as many pending bookings boarding at `stop` as the segment capacity allows.
///
/// Works on the local day containing `now`. Already accepted bookings seed the segment load;
/// pending bookings boarding at `stop` are then tried in boarding-queue order and accepted if
/// every segment they span stays within capacity. Bookings boarding elsewhere are left for a
/// later arrival. Errors never abort the pass; they end up in the report.
pub fn process_arrival<S: BookingStore + ?Sized>(
    store: &mut S,
    config: &ServiceConfig,
    stop: &StopId,
    now: Millis,
) -> AdmissionReport {
    let day = DayBucket::containing(now, config.utc_offset);
    let mut report = AdmissionReport::empty(stop, day);

    let bookings = match store.bookings_in_day(None, day, &BookingStatus::ACTIVE) {
        Ok(bookings) => bookings,
        Err(err) => {
            error!("Could not load bookings of {:?} at {:?}: {}", day, stop, err);
            report.load_error = Some(err);
            return report;
        }
    };
    if !config.route.contains(stop) {
        warn!("Shuttle arrived at {:?}, which is not on the route", stop);
    }

    let queue = BoardingQueue::build(&bookings, Some(stop));
    report.considered = queue.len();

    let mut load = SegmentLoad::from_bookings(
        queue
            .iter()
            .filter(|it| it.status == BookingStatus::Accepted),
    );

    for booking in queue.iter() {
        if booking.status != BookingStatus::Pending || booking.pickup != *stop {
            continue;
        }
        if let Some(segment) =
            load.first_overflow(&booking.segments, booking.riders, config.capacity)
        {
            let segment_load = load.load(segment);
            info!(
                "Not enough seats for booking {:?} ({} riders): {:?} already carries {} of {}",
                booking.id, booking.riders, segment, segment_load, config.capacity
            );
            report.rejected.push(Rejection {
                booking: booking.id,
                riders: booking.riders,
                segment: segment.clone(),
                load: segment_load,
            });
            continue;
        }

        load.add(&booking.segments, booking.riders);
        match apply_transition(store, booking, BookingStatus::Accepted, now) {
            Ok(_) => {
                debug!("Booking {:?} accepted at {:?}", booking.id, stop);
                report.admitted.push(booking.id);
            }
            Err(err) => {
                warn!("Failed to mark booking {:?} accepted: {}", booking.id, err);
                report.failed.push((booking.id, err));
            }
        }
    }

    info!(
        "Arrival at {:?}: {} considered, {} admitted, {} without seats, {} failed",
        stop,
        report.considered,
        report.admitted.len(),
        report.rejected.len(),
        report.failed.len()
    );
    report
}

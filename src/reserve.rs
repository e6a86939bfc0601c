use std::fmt::Display;
use std::sync::{Mutex, PoisonError};

use log::{info, warn};
use rand::Rng;

use crate::booking::{
    booking_reference, confirmation_code, Booking, BookingStatus, NewBooking, Owner,
};
use crate::capacity::{remaining_seats, SeatAvailability};
use crate::config::ServiceConfig;
use crate::primitives::{Millis, Seats};
use crate::route::Direction;
use crate::schedule::DayBucket;
use crate::stop::StopId;
use crate::store::{BookingStore, StoreError};

#[derive(Debug)]
pub enum BookingError {
    Store(StoreError),
    NoRiders,
    UnknownSlot {
        direction: Direction,
        label: Box<str>,
    },
}

impl Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Store(it) => Display::fmt(it, f),
            BookingError::NoRiders => f.write_str("a booking needs at least one rider"),
            BookingError::UnknownSlot { direction, label } => {
                write!(f, "there is no {} departure at {}", direction, label)
            }
        }
    }
}

impl std::error::Error for BookingError {}

impl From<StoreError> for BookingError {
    fn from(value: StoreError) -> Self {
        BookingError::Store(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub pickup: StopId,
    pub dropoff: StopId,
    pub riders: Seats,
    pub slot_label: String,
    pub owner: Owner,
}

/// A request resolved against the route and timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub direction: Direction,
    pub slot_label: Box<str>,
    pub scheduled_at: Millis,
    pub seats: SeatAvailability,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Created(Booking),
    InsufficientSeats { requested: Seats, quote: Quote },
}

/// Resolves the departure for `pickup`/`dropoff` at `slot_label` and the seats still free on it.
pub fn quote<S: BookingStore + ?Sized>(
    store: &S,
    config: &ServiceConfig,
    pickup: &StopId,
    dropoff: &StopId,
    slot_label: &str,
    now: Millis,
) -> Result<Quote, BookingError> {
    let direction = config.route.direction(pickup, dropoff);
    let slot = config
        .slots
        .find(direction, slot_label)
        .ok_or_else(|| BookingError::UnknownSlot {
            direction,
            label: slot_label.into(),
        })?;
    let scheduled_at = slot.next_occurrence(now, config.utc_offset);
    let day = DayBucket::containing(scheduled_at, config.utc_offset);
    let bookings = store.bookings_in_day(Some(direction), day, &BookingStatus::ACTIVE)?;
    let seats = remaining_seats(config, direction, scheduled_at, pickup, dropoff, &bookings);
    Ok(Quote {
        direction,
        slot_label: slot.label().into(),
        scheduled_at,
        seats,
    })
}

/// Creates a pending booking if the departure still has room for every rider.
///
/// The seat check and the write are two separate store calls. Two submissions racing on the same
/// departure can both pass the check; use [`SerialBooking`] where that matters.
pub fn submit<S: BookingStore + ?Sized>(
    store: &mut S,
    config: &ServiceConfig,
    request: BookingRequest,
    now: Millis,
    rng: &mut impl Rng,
) -> Result<SubmitOutcome, BookingError> {
    if request.riders == 0 {
        return Err(BookingError::NoRiders);
    }
    let quote = quote(
        store,
        config,
        &request.pickup,
        &request.dropoff,
        &request.slot_label,
        now,
    )?;
    if request.riders > quote.seats.remaining {
        info!(
            "Refusing {} riders {:?} -> {:?} at {}: {} seats left",
            request.riders, request.pickup, request.dropoff, quote.slot_label, quote.seats.remaining
        );
        return Ok(SubmitOutcome::InsufficientSeats {
            requested: request.riders,
            quote,
        });
    }

    let segments = config
        .route
        .segments_between(&request.pickup, &request.dropoff);
    if segments.is_empty() {
        warn!(
            "Booking {:?} -> {:?} spans no segments and is not capacity checked",
            request.pickup, request.dropoff
        );
    }
    let booking = store.create_booking(NewBooking {
        reference: booking_reference(now, rng),
        code: confirmation_code(rng),
        direction: quote.direction,
        segments,
        pickup: request.pickup,
        dropoff: request.dropoff,
        riders: request.riders,
        slot_label: quote.slot_label,
        scheduled_at: quote.scheduled_at,
        owner: request.owner,
        created_at: now,
    })?;
    info!(
        "Booked {:?}: {} riders {:?} -> {:?} at {}",
        booking.id, booking.riders, booking.pickup, booking.dropoff, booking.slot_label
    );
    Ok(SubmitOutcome::Created(booking))
}

/// Serializes seat checks and writes through one lock, so no two submissions can both claim
/// the last seats of a departure.
pub struct SerialBooking<S> {
    store: Mutex<S>,
}

impl<S: BookingStore> SerialBooking<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn submit(
        &self,
        config: &ServiceConfig,
        request: BookingRequest,
        now: Millis,
        rng: &mut impl Rng,
    ) -> Result<SubmitOutcome, BookingError> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        submit(&mut *store, config, request, now, rng)
    }

    /// Runs `body` with exclusive access to the store, e.g. for arrival processing.
    pub fn with_store<T>(&self, body: impl FnOnce(&mut S) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        body(&mut store)
    }

    pub fn into_inner(self) -> S {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

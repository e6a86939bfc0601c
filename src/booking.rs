use std::fmt::{Debug, Display};

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::primitives::{Millis, Seats};
use crate::route::{Direction, Segment};
use crate::stop::StopId;

/// The id under which the booking store keeps a booking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookingId(pub u64);

impl Debug for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("b#{}", self.0))
    }
}

impl Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// The statuses that hold seats.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Accepted];

    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (Accepted, Completed)
        )
    }

    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Accepted => "Accepted",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a {} booking cannot become {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Who a booking belongs to. Either a signed-in user or an anonymous guest, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(Box<str>),
    Guest(Box<str>),
}

impl Owner {
    /// A fresh `guest-xxxxx` identity.
    pub fn new_guest(rng: &mut impl Rng) -> Owner {
        let suffix: String = (0..5)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
            .collect();
        Owner::Guest(format!("guest-{}", suffix).into())
    }

    /// The key of the owner's copy of its bookings.
    pub fn key(&self) -> &str {
        match self {
            Owner::User(id) | Owner::Guest(id) => id,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Owner::User(id) => Some(id),
            Owner::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            Owner::User(_) => None,
            Owner::Guest(id) => Some(id),
        }
    }

    /// Rebuilds an owner from the two nullable id columns a record carries.
    pub fn from_ids(user_id: Option<String>, guest_id: Option<String>) -> Option<Owner> {
        match (user_id, guest_id) {
            (Some(user), None) => Some(Owner::User(user.into())),
            (None, Some(guest)) => Some(Owner::Guest(guest.into())),
            _ => None,
        }
    }
}

/// A six digit code the rider shows when boarding.
pub fn confirmation_code(rng: &mut impl Rng) -> Box<str> {
    rng.random_range(100_000..=999_999u32).to_string().into()
}

/// A locally unique reference assigned before the booking reaches the store.
pub fn booking_reference(created_at: Millis, rng: &mut impl Rng) -> Box<str> {
    let suffix: String = (0..5)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect();
    format!("{}-{}", created_at, suffix).into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// 1 to 5 stars.
    pub rating: u8,
    pub text: Option<Box<str>>,
    pub reviewed_at: Millis,
}

/// When each lifecycle transition happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTimes {
    pub updated_at: Option<Millis>,
    pub confirmed_at: Option<Millis>,
    pub completed_at: Option<Millis>,
    pub cancelled_at: Option<Millis>,
}

impl StatusTimes {
    pub fn record(&mut self, status: BookingStatus, at: Millis) {
        self.updated_at = Some(at);
        match status {
            BookingStatus::Accepted => self.confirmed_at = Some(at),
            BookingStatus::Completed => self.completed_at = Some(at),
            BookingStatus::Cancelled => self.cancelled_at = Some(at),
            BookingStatus::Pending => {}
        }
    }
}

/// A booking ready to be stored. The store assigns the [`BookingId`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub reference: Box<str>,
    pub code: Box<str>,
    pub pickup: StopId,
    pub dropoff: StopId,
    pub direction: Direction,
    pub segments: Vec<Segment>,
    pub riders: Seats,
    pub slot_label: Box<str>,
    pub scheduled_at: Millis,
    pub owner: Owner,
    pub created_at: Millis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: BookingId,
    pub reference: Box<str>,
    pub code: Box<str>,
    pub pickup: StopId,
    pub dropoff: StopId,
    pub direction: Direction,
    /// Fixed at creation from pickup, dropoff and the route; never recomputed afterwards.
    pub segments: Vec<Segment>,
    pub riders: Seats,
    pub slot_label: Box<str>,
    pub scheduled_at: Millis,
    pub status: BookingStatus,
    pub owner: Owner,
    pub created_at: Millis,
    pub times: StatusTimes,
    pub review: Option<Review>,
}

impl Booking {
    /// A freshly stored booking: pending, unreviewed.
    pub fn from_new(id: BookingId, new: NewBooking) -> Self {
        Self {
            id,
            reference: new.reference,
            code: new.code,
            pickup: new.pickup,
            dropoff: new.dropoff,
            direction: new.direction,
            segments: new.segments,
            riders: new.riders,
            slot_label: new.slot_label,
            scheduled_at: new.scheduled_at,
            status: BookingStatus::Pending,
            owner: new.owner,
            created_at: new.created_at,
            times: StatusTimes::default(),
            review: None,
        }
    }

    pub fn traverses(&self, segment: &Segment) -> bool {
        self.segments.contains(segment)
    }
}

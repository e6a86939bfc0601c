use std::fmt::Display;

use crate::booking::{Booking, BookingId, BookingStatus, NewBooking, Owner, Review};
use crate::primitives::Millis;
use crate::route::Direction;
use crate::schedule::DayBucket;

pub mod memory;
pub mod sqlite_store;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(sqlite::Error),
    UnknownBooking(BookingId),
    InvalidRecord { booking: BookingId, reason: Box<str> },
    /// The backend refused the write.
    WriteRejected(Box<str>),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(it) => write!(f, "sqlite: {}", it),
            StoreError::UnknownBooking(id) => write!(f, "no booking with id {}", id),
            StoreError::InvalidRecord { booking, reason } => {
                write!(f, "booking {} is malformed: {}", booking, reason)
            }
            StoreError::WriteRejected(reason) => write!(f, "write rejected: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlite::Error> for StoreError {
    fn from(value: sqlite::Error) -> Self {
        StoreError::Sqlite(value)
    }
}

/// The owner's duplicate of a booking's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerCopy {
    pub booking: BookingId,
    pub status: BookingStatus,
    pub updated_at: Option<Millis>,
}

/// Persistent home of bookings.
///
/// Every booking has a primary record and a per-owner copy. The two are written separately and
/// are only eventually consistent; nothing here is ever hard-deleted.
pub trait BookingStore {
    /// Bookings scheduled within `day` whose status is one of `statuses`, optionally restricted
    /// to one direction. Ordered by id.
    fn bookings_in_day(
        &self,
        direction: Option<Direction>,
        day: DayBucket,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError>;

    fn booking(&self, id: BookingId) -> Result<Booking, StoreError>;

    /// Stores a pending booking together with its owner copy.
    fn create_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError>;

    /// Writes a status change to the primary record only.
    fn update_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError>;

    /// Writes a status change to the owner's copy, creating the copy if it is missing.
    fn mirror_status(
        &mut self,
        owner: &Owner,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError>;

    fn owner_bookings(&self, owner: &Owner) -> Result<Vec<OwnerCopy>, StoreError>;

    /// Attaches a review unless the booking already has one. Returns the review now on record,
    /// which is the earlier one if there was one.
    fn record_review(&mut self, id: BookingId, review: Review) -> Result<Review, StoreError>;
}

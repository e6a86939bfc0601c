use std::fmt::Display;

use log::{info, warn};

use crate::booking::{Booking, BookingId, BookingStatus, Review, TransitionError};
use crate::primitives::Millis;
use crate::store::{BookingStore, StoreError};

#[derive(Debug)]
pub enum LifecycleError {
    Store(StoreError),
    Transition {
        booking: BookingId,
        error: TransitionError,
    },
    InvalidRating(u8),
    NotCompleted {
        booking: BookingId,
        status: BookingStatus,
    },
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::Store(it) => Display::fmt(it, f),
            LifecycleError::Transition { booking, error } => {
                write!(f, "booking {}: {}", booking, error)
            }
            LifecycleError::InvalidRating(rating) => {
                write!(f, "rating must be between 1 and 5, got {}", rating)
            }
            LifecycleError::NotCompleted { booking, status } => write!(
                f,
                "booking {} is {}, only completed rides can be reviewed",
                booking, status
            ),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        LifecycleError::Store(value)
    }
}

/// What became of the owner's copy after a transition.
#[derive(Debug)]
pub enum MirrorOutcome {
    Updated,
    /// The primary record changed but the owner copy lags behind until the next write.
    Stale(StoreError),
}

#[derive(Debug)]
pub struct TransitionOutcome {
    pub booking: BookingId,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub mirror: MirrorOutcome,
}

/// Moves an already loaded booking to `to`.
///
/// The primary record is written first and its failure is returned. The owner copy is written
/// afterwards; its failure is logged and reported in the outcome but never undoes the primary
/// write.
pub fn apply_transition<S: BookingStore + ?Sized>(
    store: &mut S,
    booking: &Booking,
    to: BookingStatus,
    at: Millis,
) -> Result<TransitionOutcome, LifecycleError> {
    let from = booking.status;
    from.transition(to)
        .map_err(|error| LifecycleError::Transition {
            booking: booking.id,
            error,
        })?;
    store.update_status(booking.id, to, at)?;
    let mirror = match store.mirror_status(&booking.owner, booking.id, to, at) {
        Ok(()) => MirrorOutcome::Updated,
        Err(err) => {
            warn!(
                "Booking {:?} is now {} but the copy of owner {} was not updated: {}",
                booking.id,
                to,
                booking.owner.key(),
                err
            );
            MirrorOutcome::Stale(err)
        }
    };
    Ok(TransitionOutcome {
        booking: booking.id,
        from,
        to,
        mirror,
    })
}

/// Loads booking `id` and moves it to `to`. See [`apply_transition`].
pub fn transition<S: BookingStore + ?Sized>(
    store: &mut S,
    id: BookingId,
    to: BookingStatus,
    at: Millis,
) -> Result<TransitionOutcome, LifecycleError> {
    let booking = store.booking(id)?;
    apply_transition(store, &booking, to, at)
}

pub fn accept<S: BookingStore + ?Sized>(
    store: &mut S,
    id: BookingId,
    at: Millis,
) -> Result<TransitionOutcome, LifecycleError> {
    transition(store, id, BookingStatus::Accepted, at)
}

pub fn cancel<S: BookingStore + ?Sized>(
    store: &mut S,
    id: BookingId,
    at: Millis,
) -> Result<TransitionOutcome, LifecycleError> {
    transition(store, id, BookingStatus::Cancelled, at)
}

pub fn complete<S: BookingStore + ?Sized>(
    store: &mut S,
    id: BookingId,
    at: Millis,
) -> Result<TransitionOutcome, LifecycleError> {
    transition(store, id, BookingStatus::Completed, at)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Recorded(Review),
    /// The ride had been reviewed before; the earlier review stands.
    AlreadyReviewed(Review),
}

/// Attaches a 1 to 5 star review to a completed ride. Submitting twice keeps the first review.
pub fn submit_review<S: BookingStore + ?Sized>(
    store: &mut S,
    id: BookingId,
    rating: u8,
    text: Option<&str>,
    at: Millis,
) -> Result<ReviewOutcome, LifecycleError> {
    if !(1..=5).contains(&rating) {
        return Err(LifecycleError::InvalidRating(rating));
    }
    let booking = store.booking(id)?;
    if booking.status != BookingStatus::Completed {
        return Err(LifecycleError::NotCompleted {
            booking: id,
            status: booking.status,
        });
    }
    if let Some(existing) = booking.review {
        info!("Booking {:?} was already reviewed, keeping the first review", id);
        return Ok(ReviewOutcome::AlreadyReviewed(existing));
    }
    let review = Review {
        rating,
        text: text.map(str::trim).filter(|it| !it.is_empty()).map(Into::into),
        reviewed_at: at,
    };
    let stored = store.record_review(id, review.clone())?;
    if stored == review {
        Ok(ReviewOutcome::Recorded(stored))
    } else {
        Ok(ReviewOutcome::AlreadyReviewed(stored))
    }
}

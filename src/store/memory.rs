use std::collections::BTreeMap;

use crate::booking::{Booking, BookingId, BookingStatus, NewBooking, Owner, Review};
use crate::col::{map_new, set_new, HashMap, HashSet};
use crate::primitives::Millis;
use crate::route::Direction;
use crate::schedule::DayBucket;

use super::{BookingStore, OwnerCopy, StoreError};

/// An in-process store. Write failures can be injected to exercise the degraded paths.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bookings: BTreeMap<BookingId, Booking>,
    owner_copies: HashMap<(Owner, BookingId), OwnerCopy>,
    next_id: u64,
    failing_status_writes: HashSet<BookingId>,
    failing_mirror_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: BTreeMap::new(),
            owner_copies: map_new(),
            next_id: 1,
            failing_status_writes: set_new(),
            failing_mirror_writes: false,
        }
    }

    /// Puts an existing booking into the store as-is, bypassing any capacity check.
    pub fn insert(&mut self, booking: Booking) {
        self.next_id = self.next_id.max(booking.id.0 + 1);
        self.owner_copies.insert(
            (booking.owner.clone(), booking.id),
            OwnerCopy {
                booking: booking.id,
                status: booking.status,
                updated_at: booking.times.updated_at,
            },
        );
        self.bookings.insert(booking.id, booking);
    }

    /// Makes every status write to the primary record of `id` fail.
    pub fn fail_status_writes_for(&mut self, id: BookingId) {
        self.failing_status_writes.insert(id);
    }

    pub fn fail_mirror_writes(&mut self, fail: bool) {
        self.failing_mirror_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingStore for MemoryStore {
    fn bookings_in_day(
        &self,
        direction: Option<Direction>,
        day: DayBucket,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .values()
            .filter(|it| direction.map_or(true, |direction| it.direction == direction))
            .filter(|it| day.contains(it.scheduled_at))
            .filter(|it| statuses.contains(&it.status))
            .cloned()
            .collect())
    }

    fn booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        self.bookings
            .get(&id)
            .cloned()
            .ok_or(StoreError::UnknownBooking(id))
    }

    fn create_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        let id = BookingId(self.next_id);
        self.next_id += 1;
        let booking = Booking::from_new(id, booking);
        self.insert(booking.clone());
        Ok(booking)
    }

    fn update_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError> {
        if self.failing_status_writes.contains(&id) {
            return Err(StoreError::WriteRejected(
                format!("status write for {:?} refused", id).into(),
            ));
        }
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::UnknownBooking(id))?;
        booking.status = status;
        booking.times.record(status, at);
        Ok(())
    }

    fn mirror_status(
        &mut self,
        owner: &Owner,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError> {
        if self.failing_mirror_writes {
            return Err(StoreError::WriteRejected(
                format!("owner copy of {:?} unavailable", id).into(),
            ));
        }
        self.owner_copies.insert(
            (owner.clone(), id),
            OwnerCopy {
                booking: id,
                status,
                updated_at: Some(at),
            },
        );
        Ok(())
    }

    fn owner_bookings(&self, owner: &Owner) -> Result<Vec<OwnerCopy>, StoreError> {
        let mut copies: Vec<OwnerCopy> = self
            .owner_copies
            .iter()
            .filter(|((copy_owner, _), _)| copy_owner == owner)
            .map(|(_, copy)| *copy)
            .collect();
        copies.sort_by_key(|it| it.booking);
        Ok(copies)
    }

    fn record_review(&mut self, id: BookingId, review: Review) -> Result<Review, StoreError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::UnknownBooking(id))?;
        Ok(booking.review.get_or_insert(review).clone())
    }
}

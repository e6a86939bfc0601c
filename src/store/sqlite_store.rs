use itertools::Itertools;
use log::warn;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use sqlite::{Connection, OpenFlags, Row};

use crate::booking::{
    Booking, BookingId, BookingStatus, NewBooking, Owner, Review, StatusTimes,
};
use crate::primitives::{Millis, Seats};
use crate::route::{Direction, Segment};
use crate::schedule::DayBucket;
use crate::stop::StopId;

use super::{BookingStore, OwnerCopy, StoreError};

#[derive(FromPrimitive)]
enum DBStatus {
    Pending = 0,
    Accepted = 1,
    Completed = 2,
    Cancelled = 3,
}

impl From<BookingStatus> for DBStatus {
    fn from(value: BookingStatus) -> Self {
        match value {
            BookingStatus::Pending => DBStatus::Pending,
            BookingStatus::Accepted => DBStatus::Accepted,
            BookingStatus::Completed => DBStatus::Completed,
            BookingStatus::Cancelled => DBStatus::Cancelled,
        }
    }
}

impl From<DBStatus> for BookingStatus {
    fn from(value: DBStatus) -> Self {
        match value {
            DBStatus::Pending => BookingStatus::Pending,
            DBStatus::Accepted => BookingStatus::Accepted,
            DBStatus::Completed => BookingStatus::Completed,
            DBStatus::Cancelled => BookingStatus::Cancelled,
        }
    }
}

#[derive(FromPrimitive)]
enum DBDirection {
    Northbound = 0,
    Southbound = 1,
}

enum DBOwnerKind {
    User = 0,
    Guest = 1,
}

fn status_to_db(status: BookingStatus) -> i64 {
    DBStatus::from(status) as i64
}

fn direction_to_db(direction: Direction) -> i64 {
    let direction = match direction {
        Direction::Northbound => DBDirection::Northbound,
        Direction::Southbound => DBDirection::Southbound,
    };
    direction as i64
}

/// Owner copies are keyed by kind and id, so a user and a guest sharing an id stay apart.
fn owner_to_db(owner: &Owner) -> (i64, &str) {
    match owner {
        Owner::User(id) => (DBOwnerKind::User as i64, &**id),
        Owner::Guest(id) => (DBOwnerKind::Guest as i64, &**id),
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS booking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference TEXT NOT NULL,
    code TEXT NOT NULL,
    pickup TEXT NOT NULL,
    dropoff TEXT NOT NULL,
    direction INTEGER NOT NULL,
    riders INTEGER NOT NULL CHECK (riders >= 1),
    slot_label TEXT NOT NULL,
    scheduled_at INTEGER NOT NULL,
    status INTEGER NOT NULL,
    user_id TEXT,
    guest_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER,
    confirmed_at INTEGER,
    completed_at INTEGER,
    cancelled_at INTEGER,
    CHECK ((user_id IS NULL) <> (guest_id IS NULL))
);
CREATE INDEX IF NOT EXISTS booking_by_schedule ON booking (scheduled_at, status);
CREATE TABLE IF NOT EXISTS booking_segment (
    booking_id INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    from_stop TEXT NOT NULL,
    to_stop TEXT NOT NULL,
    PRIMARY KEY (booking_id, seq)
);
CREATE TABLE IF NOT EXISTS owner_booking (
    owner_kind INTEGER NOT NULL,
    owner TEXT NOT NULL,
    booking_id INTEGER NOT NULL,
    status INTEGER NOT NULL,
    updated_at INTEGER,
    PRIMARY KEY (owner_kind, owner, booking_id)
);
CREATE TABLE IF NOT EXISTS review (
    booking_id INTEGER PRIMARY KEY NOT NULL,
    rating INTEGER NOT NULL,
    text TEXT,
    reviewed_at INTEGER NOT NULL
);
";

const BOOKING_COLUMNS: &str = "b.id, b.reference, b.code, b.pickup, b.dropoff, b.direction, \
    b.riders, b.slot_label, b.scheduled_at, b.status, b.user_id, b.guest_id, \
    b.created_at, b.updated_at, b.confirmed_at, b.completed_at, b.cancelled_at, \
    r.rating, r.text, r.reviewed_at";

/// Bookings kept in a sqlite database file.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::default()
                .with_create()
                .with_no_mutex()
                .with_read_write(),
        )?;
        Self::with_connection(connection)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(sqlite::open(":memory:")?)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        connection.execute(SCHEMA)?;
        Ok(Self { connection })
    }

    fn transaction<T>(
        &self,
        body: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.connection.execute("BEGIN TRANSACTION;")?;
        match body(&self.connection) {
            Ok(value) => {
                self.connection.execute("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.connection.execute("ROLLBACK;") {
                    warn!("Rollback failed after {}: {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    fn ensure_exists(&self, id: BookingId) -> Result<(), StoreError> {
        let mut stmt = self
            .connection
            .prepare("SELECT COUNT(*) FROM booking WHERE id = ?")?;
        stmt.bind((1, id.0 as i64))?;
        let count = match stmt.iter().next() {
            Some(row) => row?.read::<i64, _>(0),
            None => 0,
        };
        if count == 0 {
            return Err(StoreError::UnknownBooking(id));
        }
        Ok(())
    }

    fn segments_of(&self, id: BookingId) -> Result<Vec<Segment>, StoreError> {
        let mut stmt = self.connection.prepare(
            "SELECT from_stop, to_stop FROM booking_segment WHERE booking_id = ? ORDER BY seq ASC;",
        )?;
        stmt.bind((1, id.0 as i64))?;
        let mut segments = Vec::new();
        for row in stmt.iter() {
            let row = row?;
            segments.push(Segment::new(
                StopId::from(row.read::<&str, _>(0)),
                StopId::from(row.read::<&str, _>(1)),
            ));
        }
        Ok(segments)
    }
}

fn invalid(booking: BookingId, reason: impl Into<Box<str>>) -> StoreError {
    StoreError::InvalidRecord {
        booking,
        reason: reason.into(),
    }
}

fn read_text(row: &Row, column: usize) -> String {
    row.read::<&str, _>(column).to_owned()
}

fn read_optional_text(row: &Row, column: usize) -> Option<String> {
    row.read::<Option<&str>, _>(column).map(str::to_owned)
}

/// Reads the booking columns of `row`. Segments are stored separately and left empty here.
fn read_booking(row: &Row) -> Result<Booking, StoreError> {
    let id = BookingId(row.read::<i64, _>(0) as u64);
    let direction: i64 = row.read(5);
    let direction = match DBDirection::from_i64(direction) {
        Some(DBDirection::Northbound) => Direction::Northbound,
        Some(DBDirection::Southbound) => Direction::Southbound,
        None => return Err(invalid(id, format!("unknown direction {}", direction))),
    };
    let riders: i64 = row.read(6);
    let riders = Seats::try_from(riders)
        .ok()
        .filter(|it| *it >= 1)
        .ok_or_else(|| invalid(id, format!("rider count {}", riders)))?;
    let status: i64 = row.read(9);
    let status: BookingStatus = DBStatus::from_i64(status)
        .ok_or_else(|| invalid(id, format!("unknown status {}", status)))?
        .into();
    let owner = Owner::from_ids(read_optional_text(row, 10), read_optional_text(row, 11))
        .ok_or_else(|| invalid(id, "exactly one of user and guest id must be set"))?;
    let rating: Option<i64> = row.read(17);
    let review = match rating {
        None => None,
        Some(rating) => Some(Review {
            rating: u8::try_from(rating).map_err(|_| invalid(id, "rating out of range"))?,
            text: read_optional_text(row, 18).map(String::into_boxed_str),
            reviewed_at: row.read::<Option<i64>, _>(19).unwrap_or_default(),
        }),
    };
    Ok(Booking {
        id,
        reference: read_text(row, 1).into(),
        code: read_text(row, 2).into(),
        pickup: StopId::from(read_text(row, 3)),
        dropoff: StopId::from(read_text(row, 4)),
        direction,
        segments: Vec::new(),
        riders,
        slot_label: read_text(row, 7).into(),
        scheduled_at: row.read::<i64, _>(8) as Millis,
        status,
        owner,
        created_at: row.read::<i64, _>(12) as Millis,
        times: StatusTimes {
            updated_at: row.read(13),
            confirmed_at: row.read(14),
            completed_at: row.read(15),
            cancelled_at: row.read(16),
        },
        review,
    })
}

impl BookingStore for SqliteStore {
    /// Rows that cannot be read are logged and left out, so one bad record never hides the rest
    /// of the day.
    fn bookings_in_day(
        &self,
        direction: Option<Direction>,
        day: DayBucket,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = format!(
            "SELECT {} FROM booking b LEFT JOIN review r ON r.booking_id = b.id \
            WHERE b.scheduled_at >= ? AND b.scheduled_at < ? AND b.status IN ({})",
            BOOKING_COLUMNS,
            statuses.iter().map(|_| "?").join(", ")
        );
        if direction.is_some() {
            query.push_str(" AND b.direction = ?");
        }
        query.push_str(" ORDER BY b.id ASC;");

        let mut stmt = self.connection.prepare(query)?;
        stmt.bind((1, day.start))?;
        stmt.bind((2, day.end))?;
        for (offset, status) in statuses.iter().enumerate() {
            stmt.bind((3 + offset, status_to_db(*status)))?;
        }
        if let Some(direction) = direction {
            stmt.bind((3 + statuses.len(), direction_to_db(direction)))?;
        }
        let mut bookings = Vec::new();
        for row in stmt.iter() {
            match read_booking(&row?) {
                Ok(booking) => bookings.push(booking),
                Err(err) => warn!("Skipping unreadable booking: {}", err),
            }
        }
        for booking in &mut bookings {
            booking.segments = self.segments_of(booking.id)?;
        }
        Ok(bookings)
    }

    fn booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        let mut stmt = self.connection.prepare(format!(
            "SELECT {} FROM booking b LEFT JOIN review r ON r.booking_id = b.id WHERE b.id = ?;",
            BOOKING_COLUMNS
        ))?;
        stmt.bind((1, id.0 as i64))?;
        let mut booking = match stmt.iter().next() {
            Some(row) => read_booking(&row?)?,
            None => return Err(StoreError::UnknownBooking(id)),
        };
        booking.segments = self.segments_of(id)?;
        Ok(booking)
    }

    fn create_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        let id = self.transaction(|connection| {
            let mut stmt = connection.prepare(
                "INSERT INTO booking \
                (reference, code, pickup, dropoff, direction, riders, slot_label, \
                scheduled_at, status, user_id, guest_id, created_at) \
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            stmt.bind((1, &*booking.reference))?;
            stmt.bind((2, &*booking.code))?;
            stmt.bind((3, booking.pickup.as_str()))?;
            stmt.bind((4, booking.dropoff.as_str()))?;
            stmt.bind((5, direction_to_db(booking.direction)))?;
            stmt.bind((6, booking.riders as i64))?;
            stmt.bind((7, &*booking.slot_label))?;
            stmt.bind((8, booking.scheduled_at))?;
            stmt.bind((9, status_to_db(BookingStatus::Pending)))?;
            stmt.bind((10, booking.owner.user_id()))?;
            stmt.bind((11, booking.owner.guest_id()))?;
            stmt.bind((12, booking.created_at))?;
            stmt.next()?;

            let mut stmt = connection.prepare("SELECT last_insert_rowid();")?;
            let id = match stmt.iter().next() {
                Some(row) => BookingId(row?.read::<i64, _>(0) as u64),
                None => {
                    return Err(StoreError::WriteRejected(
                        "no row id after insert".into(),
                    ))
                }
            };

            let mut stmt = connection.prepare(
                "INSERT INTO booking_segment (booking_id, seq, from_stop, to_stop) \
                VALUES (?, ?, ?, ?)",
            )?;
            for (seq, segment) in booking.segments.iter().enumerate() {
                stmt.bind((1, id.0 as i64))?;
                stmt.bind((2, seq as i64))?;
                stmt.bind((3, segment.from.as_str()))?;
                stmt.bind((4, segment.to.as_str()))?;
                stmt.next()?;
                stmt.reset()?;
            }

            let (owner_kind, owner) = owner_to_db(&booking.owner);
            let mut stmt = connection.prepare(
                "INSERT INTO owner_booking (owner_kind, owner, booking_id, status, updated_at) \
                VALUES (?, ?, ?, ?, NULL)",
            )?;
            stmt.bind((1, owner_kind))?;
            stmt.bind((2, owner))?;
            stmt.bind((3, id.0 as i64))?;
            stmt.bind((4, status_to_db(BookingStatus::Pending)))?;
            stmt.next()?;
            Ok(id)
        })?;
        Ok(Booking::from_new(id, booking))
    }

    fn update_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError> {
        self.ensure_exists(id)?;
        let stamp_column = match status {
            BookingStatus::Accepted => Some("confirmed_at"),
            BookingStatus::Completed => Some("completed_at"),
            BookingStatus::Cancelled => Some("cancelled_at"),
            BookingStatus::Pending => None,
        };
        let mut stmt = match stamp_column {
            Some(column) => {
                let mut stmt = self.connection.prepare(format!(
                    "UPDATE booking SET status = ?, updated_at = ?, {} = ? WHERE id = ?",
                    column
                ))?;
                stmt.bind((3, at))?;
                stmt.bind((4, id.0 as i64))?;
                stmt
            }
            None => {
                let mut stmt = self
                    .connection
                    .prepare("UPDATE booking SET status = ?, updated_at = ? WHERE id = ?")?;
                stmt.bind((3, id.0 as i64))?;
                stmt
            }
        };
        stmt.bind((1, status_to_db(status)))?;
        stmt.bind((2, at))?;
        stmt.next()?;
        Ok(())
    }

    fn mirror_status(
        &mut self,
        owner: &Owner,
        id: BookingId,
        status: BookingStatus,
        at: Millis,
    ) -> Result<(), StoreError> {
        let (owner_kind, owner) = owner_to_db(owner);
        let mut stmt = self.connection.prepare(
            "INSERT INTO owner_booking (owner_kind, owner, booking_id, status, updated_at) \
            VALUES (?, ?, ?, ?, ?) \
            ON CONFLICT (owner_kind, owner, booking_id) DO UPDATE SET \
            status = excluded.status, updated_at = excluded.updated_at",
        )?;
        stmt.bind((1, owner_kind))?;
        stmt.bind((2, owner))?;
        stmt.bind((3, id.0 as i64))?;
        stmt.bind((4, status_to_db(status)))?;
        stmt.bind((5, at))?;
        stmt.next()?;
        Ok(())
    }

    fn owner_bookings(&self, owner: &Owner) -> Result<Vec<OwnerCopy>, StoreError> {
        let (owner_kind, owner) = owner_to_db(owner);
        let mut stmt = self.connection.prepare(
            "SELECT booking_id, status, updated_at FROM owner_booking \
            WHERE owner_kind = ? AND owner = ? ORDER BY booking_id ASC;",
        )?;
        stmt.bind((1, owner_kind))?;
        stmt.bind((2, owner))?;
        let mut copies = Vec::new();
        for row in stmt.iter() {
            let row = row?;
            let booking = BookingId(row.read::<i64, _>(0) as u64);
            let status: i64 = row.read(1);
            let status: BookingStatus = DBStatus::from_i64(status)
                .ok_or_else(|| invalid(booking, format!("unknown status {}", status)))?
                .into();
            copies.push(OwnerCopy {
                booking,
                status,
                updated_at: row.read(2),
            });
        }
        Ok(copies)
    }

    fn record_review(&mut self, id: BookingId, review: Review) -> Result<Review, StoreError> {
        self.ensure_exists(id)?;
        self.transaction(|connection| {
            let mut stmt = connection.prepare(
                "INSERT INTO review (booking_id, rating, text, reviewed_at) VALUES (?, ?, ?, ?) \
                ON CONFLICT (booking_id) DO NOTHING",
            )?;
            stmt.bind((1, id.0 as i64))?;
            stmt.bind((2, review.rating as i64))?;
            stmt.bind((3, review.text.as_deref()))?;
            stmt.bind((4, review.reviewed_at))?;
            stmt.next()?;

            let mut stmt = connection
                .prepare("SELECT rating, text, reviewed_at FROM review WHERE booking_id = ?")?;
            stmt.bind((1, id.0 as i64))?;
            match stmt.iter().next() {
                Some(row) => {
                    let row = row?;
                    Ok(Review {
                        rating: u8::try_from(row.read::<i64, _>(0))
                            .map_err(|_| invalid(id, "rating out of range"))?,
                        text: read_optional_text(&row, 1).map(String::into_boxed_str),
                        reviewed_at: row.read::<i64, _>(2),
                    })
                }
                None => Err(StoreError::WriteRejected(
                    format!("review for {:?} vanished", id).into(),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::admission::process_arrival;
    use crate::booking::BookingStatus::*;
    use crate::lifecycle::{cancel, complete, submit_review, ReviewOutcome};
    use crate::primitives::MINUTE_MILLIS;
    use crate::schedule::utc;
    use crate::test::sample::{booking, sample_config, seg, NOON};

    use super::*;

    fn new_booking(pickup: &str, dropoff: &str, scheduled_at: Millis, owner: Owner) -> NewBooking {
        let pickup = StopId::new(pickup);
        let dropoff = StopId::new(dropoff);
        NewBooking {
            reference: "1-abcde".into(),
            code: "123456".into(),
            segments: vec![Segment::new(pickup.clone(), dropoff.clone())],
            pickup,
            dropoff,
            direction: Direction::Northbound,
            riders: 2,
            slot_label: "7:00 AM".into(),
            scheduled_at,
            owner,
            created_at: 1,
        }
    }

    #[test]
    fn round_trips_bookings_through_sqlite() {
        let mut store = SqliteStore::in_memory().unwrap();
        let created = store
            .create_booking(new_booking("S1", "S2", 1_000, Owner::User("u1".into())))
            .unwrap();
        let loaded = store.booking(created.id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.status, Pending);
        assert_eq!(loaded.segments.len(), 1);
        assert!(matches!(
            store.booking(BookingId(99)),
            Err(StoreError::UnknownBooking(BookingId(99)))
        ));
    }

    #[test]
    fn queries_by_day_status_and_direction() {
        let mut store = SqliteStore::in_memory().unwrap();
        let day = DayBucket::containing(10_000, utc());
        let a = store
            .create_booking(new_booking("S1", "S2", 10_000, Owner::Guest("guest-a".into())))
            .unwrap();
        let b = store
            .create_booking(new_booking("S1", "S2", 20_000, Owner::Guest("guest-b".into())))
            .unwrap();
        store
            .create_booking(new_booking("S1", "S2", day.end, Owner::Guest("guest-c".into())))
            .unwrap();
        store.update_status(b.id, Cancelled, 30_000).unwrap();

        let active = store
            .bookings_in_day(None, day, &BookingStatus::ACTIVE)
            .unwrap();
        assert_eq!(active.iter().map(|it| it.id).collect_vec(), vec![a.id]);

        let north = store
            .bookings_in_day(Some(Direction::Northbound), day, &[Pending, Cancelled])
            .unwrap();
        assert_eq!(north.len(), 2);
        let south = store
            .bookings_in_day(Some(Direction::Southbound), day, &[Pending, Cancelled])
            .unwrap();
        assert!(south.is_empty());
        assert!(store.bookings_in_day(None, day, &[]).unwrap().is_empty());
    }

    #[test]
    fn status_updates_and_owner_copies() {
        let mut store = SqliteStore::in_memory().unwrap();
        let owner = Owner::User("u1".into());
        let booking = store
            .create_booking(new_booking("S1", "S2", 1_000, owner.clone()))
            .unwrap();
        store.update_status(booking.id, Accepted, 5_000).unwrap();
        let loaded = store.booking(booking.id).unwrap();
        assert_eq!(loaded.status, Accepted);
        assert_eq!(loaded.times.confirmed_at, Some(5_000));
        assert_eq!(loaded.times.updated_at, Some(5_000));

        // The owner copy only changes when mirrored.
        assert_eq!(store.owner_bookings(&owner).unwrap()[0].status, Pending);
        store.mirror_status(&owner, booking.id, Accepted, 5_000).unwrap();
        assert_eq!(
            store.owner_bookings(&owner).unwrap(),
            vec![OwnerCopy {
                booking: booking.id,
                status: Accepted,
                updated_at: Some(5_000)
            }]
        );
        assert!(matches!(
            store.update_status(BookingId(42), Accepted, 0),
            Err(StoreError::UnknownBooking(_))
        ));
    }

    #[test]
    fn reviews_are_recorded_once() {
        let mut store = SqliteStore::in_memory().unwrap();
        let booking = store
            .create_booking(new_booking("S1", "S2", 1_000, Owner::User("u1".into())))
            .unwrap();
        let first = Review {
            rating: 5,
            text: Some("smooth".into()),
            reviewed_at: 9_000,
        };
        let second = Review {
            rating: 1,
            text: None,
            reviewed_at: 9_500,
        };
        assert_eq!(store.record_review(booking.id, first.clone()).unwrap(), first);
        assert_eq!(store.record_review(booking.id, second).unwrap(), first);
        assert_eq!(store.booking(booking.id).unwrap().review, Some(first));
    }

    #[test]
    fn persists_across_connections() {
        let path = std::env::temp_dir().join(format!(
            "shuttle-board-test-{}.sqlite3",
            std::process::id()
        ));
        let path = path.to_str().unwrap().to_owned();
        let _ = std::fs::remove_file(&path);
        let id = {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .create_booking(new_booking("S1", "S2", 1_000, Owner::User("u1".into())))
                .unwrap()
                .id
        };
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.booking(id).unwrap().pickup, StopId::new("S1"));
        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stop_ids_with_separators_round_trip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut new = new_booking("Main St, North", "X", 1_000, Owner::User("u1".into()));
        new.segments = vec![
            Segment::new(StopId::new("Main St, North"), StopId::new("Depot|East")),
            Segment::new(StopId::new("Depot|East"), StopId::new("X")),
        ];
        let created = store.create_booking(new).unwrap();
        let loaded = store.booking(created.id).unwrap();
        assert_eq!(loaded.segments, created.segments);
        assert_eq!(loaded.pickup, StopId::new("Main St, North"));
    }

    #[test]
    fn unreadable_rows_do_not_hide_the_rest_of_the_day() {
        let mut store = SqliteStore::in_memory().unwrap();
        let day = DayBucket::containing(10_000, utc());
        let ids = ["guest-a", "guest-b", "guest-c"]
            .into_iter()
            .map(|guest| {
                store
                    .create_booking(new_booking("S1", "S3", 10_000, Owner::Guest(guest.into())))
                    .unwrap()
                    .id
            })
            .collect_vec();
        store
            .connection
            .execute(format!("UPDATE booking SET direction = 7 WHERE id = {}", ids[1].0))
            .unwrap();

        let loaded = store
            .bookings_in_day(None, day, &BookingStatus::ACTIVE)
            .unwrap();
        assert_eq!(loaded.iter().map(|it| it.id).collect_vec(), vec![ids[0], ids[2]]);
        assert!(loaded.iter().all(|it| it.segments.len() == 1));
        assert!(matches!(
            store.booking(ids[1]),
            Err(StoreError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn users_and_guests_sharing_an_id_keep_separate_copies() {
        let mut store = SqliteStore::in_memory().unwrap();
        let guest = Owner::Guest("guest-abcde".into());
        let user = Owner::User("guest-abcde".into());
        let created = store
            .create_booking(new_booking("S1", "S2", 1_000, guest.clone()))
            .unwrap();
        assert!(store.owner_bookings(&user).unwrap().is_empty());

        store.mirror_status(&user, created.id, Cancelled, 2_000).unwrap();
        assert_eq!(store.owner_bookings(&guest).unwrap()[0].status, Pending);
        assert_eq!(store.owner_bookings(&user).unwrap()[0].status, Cancelled);
    }

    #[test]
    fn mirroring_creates_a_missing_copy() {
        let mut store = SqliteStore::in_memory().unwrap();
        let owner = Owner::User("u1".into());
        let created = store
            .create_booking(new_booking("S1", "S2", 1_000, owner.clone()))
            .unwrap();
        store.connection.execute("DELETE FROM owner_booking;").unwrap();
        assert!(store.owner_bookings(&owner).unwrap().is_empty());

        store.mirror_status(&owner, created.id, Accepted, 3_000).unwrap();
        assert_eq!(
            store.owner_bookings(&owner).unwrap(),
            vec![OwnerCopy {
                booking: created.id,
                status: Accepted,
                updated_at: Some(3_000)
            }]
        );
    }

    fn as_new(booking: Booking) -> NewBooking {
        NewBooking {
            reference: booking.reference,
            code: booking.code,
            pickup: booking.pickup,
            dropoff: booking.dropoff,
            direction: booking.direction,
            segments: booking.segments,
            riders: booking.riders,
            slot_label: booking.slot_label,
            scheduled_at: booking.scheduled_at,
            owner: booking.owner,
            created_at: booking.created_at,
        }
    }

    #[test]
    fn admission_and_lifecycle_run_against_sqlite() {
        let config = sample_config();
        let mut store = SqliteStore::in_memory().unwrap();
        for sample in [
            booking(1, "S1", "S3", 3, Pending),
            booking(2, "S1", "S4", 3, Pending),
            booking(3, "S2", "S4", 2, Pending),
        ] {
            let created = store.create_booking(as_new(sample.clone())).unwrap();
            assert_eq!(created.id, sample.id);
        }

        let report = process_arrival(&mut store, &config, &StopId::new("S1"), NOON);
        assert!(report.is_clean());
        assert_eq!(report.admitted, vec![BookingId(1)]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].booking, BookingId(2));
        assert_eq!(report.rejected[0].segment, seg("S1", "S2"));

        let at_s2 = NOON + 5 * MINUTE_MILLIS;
        let report = process_arrival(&mut store, &config, &StopId::new("S2"), at_s2);
        assert!(report.is_clean());
        assert_eq!(report.admitted, vec![BookingId(3)]);

        let first = store.booking(BookingId(1)).unwrap();
        assert_eq!(first.times.confirmed_at, Some(NOON));
        assert_eq!(first.segments, vec![seg("S1", "S2"), seg("S2", "S3")]);
        assert_eq!(
            store.booking(BookingId(3)).unwrap().times.confirmed_at,
            Some(at_s2)
        );

        let later = NOON + 30 * MINUTE_MILLIS;
        complete(&mut store, BookingId(1), later).unwrap();
        let review = submit_review(&mut store, BookingId(1), 4, Some(" on time "), later).unwrap();
        assert_eq!(
            review,
            ReviewOutcome::Recorded(Review {
                rating: 4,
                text: Some("on time".into()),
                reviewed_at: later,
            })
        );
        cancel(&mut store, BookingId(2), later).unwrap();

        let copies = (1..=3)
            .map(|id| {
                let owner = Owner::Guest(format!("guest-{:05}", id).into());
                store.owner_bookings(&owner).unwrap()[0].status
            })
            .collect_vec();
        assert_eq!(copies, vec![Completed, Cancelled, Accepted]);
        assert_eq!(
            store.booking(BookingId(1)).unwrap().review.map(|it| it.rating),
            Some(4)
        );
    }
}

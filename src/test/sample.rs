use crate::booking::{Booking, BookingId, BookingStatus, Owner, StatusTimes};
use crate::config::{ServiceConfig, SlotTable};
use crate::primitives::{Millis, Seats, MINUTE_MILLIS};
use crate::route::{Route, Segment};
use crate::schedule::{utc, TimeSlot};
use crate::stop::{Coordinate, Stop, StopId, StopRegistry};

/// 2026-10-18 12:00 UTC.
pub const NOON: Millis = 1_792_324_800_000;

pub fn seg(from: &str, to: &str) -> Segment {
    Segment::new(StopId::new(from), StopId::new(to))
}

fn slots(labels: &[&str]) -> Vec<TimeSlot> {
    labels
        .iter()
        .map(|it| TimeSlot::parse(it).unwrap())
        .collect()
}

/// Four stops `S1..S4`, five seats, UTC.
pub fn sample_config() -> ServiceConfig {
    ServiceConfig {
        route: Route::new(["S1", "S2", "S3", "S4"].map(StopId::new)),
        capacity: 5,
        slots: SlotTable::new(
            slots(&["7:00 AM", "8:00 AM", "4:00 PM", "5:00 PM"]),
            slots(&["6:30 AM", "7:30 AM", "3:30 PM", "4:30 PM"]),
        ),
        utc_offset: utc(),
    }
}

/// The stops of [`sample_config`], one kilometre-ish apart going north.
pub fn sample_registry() -> StopRegistry {
    StopRegistry::new((0..4).map(|idx| Stop {
        id: StopId::new(format!("S{}", idx + 1)),
        title: format!("Stop {}", idx + 1),
        position: Coordinate {
            latitude: 33.74 + 0.01 * idx as f64,
            longitude: -84.39,
        },
        order: idx,
    }))
}

/// A booking on the sample route, scheduled at [`NOON`]. Higher ids were created later.
pub fn booking(
    id: u64,
    pickup: &str,
    dropoff: &str,
    riders: Seats,
    status: BookingStatus,
) -> Booking {
    let config = sample_config();
    let pickup = StopId::new(pickup);
    let dropoff = StopId::new(dropoff);
    let mut times = StatusTimes::default();
    if status != BookingStatus::Pending {
        times.record(status, NOON - 2 * 60 * MINUTE_MILLIS);
    }
    Booking {
        id: BookingId(id),
        reference: format!("ref-{}", id).into(),
        code: format!("{:06}", 100_000 + id).into(),
        direction: config.route.direction(&pickup, &dropoff),
        segments: config.route.segments_between(&pickup, &dropoff),
        pickup,
        dropoff,
        riders,
        slot_label: "12:00 PM".into(),
        scheduled_at: NOON,
        status,
        owner: Owner::Guest(format!("guest-{:05}", id).into()),
        created_at: NOON - 60 * MINUTE_MILLIS + id as Millis * MINUTE_MILLIS,
        times,
        review: None,
    }
}

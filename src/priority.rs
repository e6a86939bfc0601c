use crate::booking::{Booking, BookingStatus};
use crate::stop::StopId;

/// Lower is served first. Accepted bookings beat pending ones, and bookings boarding at the
/// current stop beat those boarding further along.
pub fn priority_score(booking: &Booking, current_stop: Option<&StopId>) -> u8 {
    let base = match booking.status {
        BookingStatus::Accepted => 0,
        _ => 1,
    };
    let boards_elsewhere = current_stop.is_some_and(|stop| booking.pickup != *stop);
    base + if boards_elsewhere { 2 } else { 0 }
}

/// Bookings in the order they are considered for boarding.
///
/// Rebuilt from scratch on every arrival; it is never mutated incrementally.
#[derive(Debug, Clone)]
pub struct BoardingQueue<'a> {
    entries: Vec<(u8, &'a Booking)>,
}

impl<'a> BoardingQueue<'a> {
    /// Orders by score, then scheduled time, then creation time. The booking id settles any
    /// remaining tie so equal inputs always give the same order.
    pub fn build(
        bookings: impl IntoIterator<Item = &'a Booking>,
        current_stop: Option<&StopId>,
    ) -> Self {
        let mut entries = bookings
            .into_iter()
            .map(|booking| (priority_score(booking, current_stop), booking))
            .collect::<Vec<_>>();
        entries.sort_by(|(score_a, a), (score_b, b)| {
            score_a
                .cmp(score_b)
                .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Booking> + '_ {
        self.entries.iter().map(|(_, booking)| *booking)
    }

    pub fn scored(&self) -> impl Iterator<Item = (u8, &'a Booking)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::booking::BookingId;
    use crate::primitives::MINUTE_MILLIS;
    use crate::test::sample::booking;

    use super::*;

    fn ids(queue: &BoardingQueue) -> Vec<u64> {
        queue.iter().map(|it| it.id.0).collect_vec()
    }

    #[test]
    fn accepted_here_then_pending_here_then_elsewhere() {
        let bookings = vec![
            booking(1, "S2", "S4", 1, BookingStatus::Pending),
            booking(2, "S1", "S3", 1, BookingStatus::Pending),
            booking(3, "S1", "S3", 1, BookingStatus::Accepted),
        ];
        let stop = StopId::new("S1");
        let queue = BoardingQueue::build(&bookings, Some(&stop));
        assert_eq!(ids(&queue), vec![3, 2, 1]);
        assert_eq!(queue.scored().map(|it| it.0).collect_vec(), vec![0, 1, 3]);
    }

    #[test]
    fn accepted_elsewhere_ranks_between_pending_here_and_pending_elsewhere() {
        let bookings = vec![
            booking(1, "S2", "S4", 1, BookingStatus::Pending),
            booking(2, "S2", "S4", 1, BookingStatus::Accepted),
            booking(3, "S1", "S3", 1, BookingStatus::Pending),
        ];
        let stop = StopId::new("S1");
        let queue = BoardingQueue::build(&bookings, Some(&stop));
        assert_eq!(ids(&queue), vec![3, 2, 1]);
    }

    #[test]
    fn ties_break_on_schedule_then_creation() {
        let mut early = booking(5, "S1", "S2", 1, BookingStatus::Pending);
        early.scheduled_at -= 30 * MINUTE_MILLIS;
        let bookings = vec![
            booking(4, "S1", "S2", 1, BookingStatus::Pending),
            booking(2, "S1", "S2", 1, BookingStatus::Pending),
            early,
        ];
        let stop = StopId::new("S1");
        let queue = BoardingQueue::build(&bookings, Some(&stop));
        assert_eq!(ids(&queue), vec![5, 2, 4]);
    }

    #[test]
    fn without_current_stop_only_status_matters() {
        let bookings = vec![
            booking(1, "S3", "S4", 1, BookingStatus::Pending),
            booking(2, "S2", "S4", 1, BookingStatus::Accepted),
        ];
        let queue = BoardingQueue::build(&bookings, None);
        assert_eq!(ids(&queue), vec![2, 1]);
        assert_eq!(priority_score(&bookings[0], None), 1);
    }

    #[test]
    fn deterministic_for_any_input_order() {
        let mut same = booking(7, "S1", "S2", 1, BookingStatus::Pending);
        let twin = {
            let mut twin = same.clone();
            twin.id = BookingId(8);
            twin
        };
        same.created_at = twin.created_at;
        let forward = vec![same.clone(), twin.clone()];
        let backward = vec![twin, same];
        let stop = StopId::new("S1");
        assert_eq!(
            ids(&BoardingQueue::build(&forward, Some(&stop))),
            ids(&BoardingQueue::build(&backward, Some(&stop)))
        );
    }
}

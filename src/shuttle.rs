//! The shuttle's position on its loop and the arrivals it triggers.

use log::{info, warn};

use crate::admission::{process_arrival, AdmissionReport};
use crate::config::ServiceConfig;
use crate::primitives::Millis;
use crate::stop::{eta_minutes, Stop, StopId, StopRegistry};
use crate::store::BookingStore;

/// Drives a single shuttle around the registry's stops in `order`, wrapping after the last one.
#[derive(Debug, Clone)]
pub struct Shuttle {
    stops: Vec<Stop>,
    current: Option<usize>,
}

impl Shuttle {
    pub fn new(registry: &StopRegistry) -> Self {
        let stops = registry.by_order().into_iter().cloned().collect::<Vec<_>>();
        if stops.is_empty() {
            warn!("Shuttle has no stops to serve");
        }
        Self {
            stops,
            current: None,
        }
    }

    /// Places the shuttle at `stop` without processing an arrival.
    pub fn park_at(&mut self, stop: &StopId) -> bool {
        match self.stops.iter().position(|it| it.id == *stop) {
            Some(idx) => {
                self.current = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&Stop> {
        self.current.map(|idx| &self.stops[idx])
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Moves on to the next stop. A shuttle that has not started yet goes to the first stop.
    pub fn advance(&mut self) -> Option<&Stop> {
        if self.stops.is_empty() {
            return None;
        }
        let next = self.current.map_or(0, |idx| (idx + 1) % self.stops.len());
        self.current = Some(next);
        Some(&self.stops[next])
    }

    /// Moves on to the next stop and admits the riders waiting there.
    pub fn advance_and_process<S: BookingStore + ?Sized>(
        &mut self,
        store: &mut S,
        config: &ServiceConfig,
        now: Millis,
    ) -> Option<AdmissionReport> {
        let stop = self.advance()?.id.clone();
        info!("Shuttle arrived at {:?}", stop);
        Some(process_arrival(store, config, &stop, now))
    }

    /// Minutes until the shuttle reaches `target` in a straight line from its current stop.
    /// `None` while the shuttle has not started or if `target` is not served.
    pub fn eta_minutes_to(&self, target: &StopId) -> Option<u32> {
        let current = self.current()?;
        let target = self.stops.iter().find(|it| it.id == *target)?;
        Some(eta_minutes(current.position.distance_meters(&target.position)))
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::booking::{BookingId, BookingStatus};
    use crate::store::memory::MemoryStore;
    use crate::test::sample::{booking, sample_config, sample_registry, NOON};

    use super::*;

    #[test]
    fn loops_through_stops_in_order() {
        let mut shuttle = Shuttle::new(&sample_registry());
        assert!(shuttle.current().is_none());
        let visited = (0..6)
            .map(|_| shuttle.advance().unwrap().id.to_string())
            .collect_vec();
        assert_eq!(visited, vec!["S1", "S2", "S3", "S4", "S1", "S2"]);
    }

    #[test]
    fn empty_registry_never_moves() {
        let mut shuttle = Shuttle::new(&StopRegistry::default());
        assert!(shuttle.advance().is_none());
        let mut store = MemoryStore::new();
        assert!(shuttle
            .advance_and_process(&mut store, &sample_config(), NOON)
            .is_none());
    }

    #[test]
    fn arrivals_admit_riders_stop_by_stop() {
        let config = sample_config();
        let mut store = MemoryStore::new();
        store.insert(booking(1, "S1", "S3", 2, BookingStatus::Pending));
        store.insert(booking(2, "S2", "S4", 3, BookingStatus::Pending));
        store.insert(booking(3, "S2", "S3", 1, BookingStatus::Pending));

        let mut shuttle = Shuttle::new(&sample_registry());
        let first = shuttle
            .advance_and_process(&mut store, &config, NOON)
            .unwrap();
        assert_eq!(first.stop, StopId::new("S1"));
        assert_eq!(first.admitted, vec![BookingId(1)]);

        let second = shuttle
            .advance_and_process(&mut store, &config, NOON)
            .unwrap();
        assert_eq!(second.admitted, vec![BookingId(2)]);
        assert_eq!(second.rejected.len(), 1);
        assert_eq!(second.rejected[0].booking, BookingId(3));
    }

    #[test]
    fn eta_grows_with_distance() {
        let mut shuttle = Shuttle::new(&sample_registry());
        assert_eq!(shuttle.eta_minutes_to(&StopId::new("S2")), None);
        assert!(shuttle.park_at(&StopId::new("S1")));
        assert!(!shuttle.park_at(&StopId::new("S9")));

        assert_eq!(shuttle.eta_minutes_to(&StopId::new("S1")), Some(0));
        let near = shuttle.eta_minutes_to(&StopId::new("S2")).unwrap();
        let far = shuttle.eta_minutes_to(&StopId::new("S4")).unwrap();
        assert!(near < far);
        // 0.01 degrees of latitude are about 1.1 km, two minutes at shuttle speed.
        assert_eq!(near, 2);
        assert_eq!(shuttle.eta_minutes_to(&StopId::new("S9")), None);
    }
}

use std::fmt::{Debug, Display};

use log::warn;

use crate::col::{map_new, HashMap};
use crate::stop::StopId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Travelling towards higher indices of the route order.
    Northbound,
    /// Travelling towards lower indices of the route order.
    Southbound,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Northbound, Direction::Southbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Northbound => "northbound",
            Direction::Southbound => "southbound",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed hop between two adjacent stops of the route.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub from: StopId,
    pub to: StopId,
}

impl Segment {
    pub fn new(from: StopId, to: StopId) -> Self {
        Self { from, to }
    }

    pub fn reversed(&self) -> Segment {
        Segment {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// Parses the `from|to` form produced by `Display`.
    pub fn parse(text: &str) -> Option<Segment> {
        let (from, to) = text.split_once('|')?;
        if from.is_empty() || to.is_empty() {
            return None;
        }
        Some(Segment::new(StopId::new(from), StopId::new(to)))
    }
}

impl Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}|{}", self.from, self.to))
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}|{}", self.from, self.to))
    }
}

/// The fixed, ordered sequence of stops the shuttle serves.
#[derive(Debug, Clone)]
pub struct Route {
    stops: Vec<StopId>,
    index_by_stop: HashMap<StopId, usize>,
}

impl Route {
    /// Builds a route from its stop order. A stop listed twice keeps its first position.
    pub fn new(stops: impl IntoIterator<Item = StopId>) -> Self {
        let mut ordered = Vec::new();
        let mut index_by_stop = map_new();
        for stop in stops {
            if index_by_stop.contains_key(&stop) {
                warn!("Stop {:?} listed twice in route order, ignoring repetition", stop);
                continue;
            }
            index_by_stop.insert(stop.clone(), ordered.len());
            ordered.push(stop);
        }
        Self {
            stops: ordered,
            index_by_stop,
        }
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn index_of(&self, stop: &StopId) -> Option<usize> {
        self.index_by_stop.get(stop).copied()
    }

    pub fn contains(&self, stop: &StopId) -> bool {
        self.index_by_stop.contains_key(stop)
    }

    /// The direction of travel from `pickup` to `dropoff`, or `None` if either is not served.
    pub fn try_direction(&self, pickup: &StopId, dropoff: &StopId) -> Option<Direction> {
        let p = self.index_of(pickup)?;
        let d = self.index_of(dropoff)?;
        Some(if d > p {
            Direction::Northbound
        } else {
            Direction::Southbound
        })
    }

    /// Like [`Route::try_direction`], but degrades to northbound for stops outside the route.
    /// The fallback is provisional and is only logged, never reported as an error.
    pub fn direction(&self, pickup: &StopId, dropoff: &StopId) -> Direction {
        self.try_direction(pickup, dropoff).unwrap_or_else(|| {
            warn!(
                "Cannot derive direction for {:?} -> {:?}: stop not on route, assuming {}",
                pickup,
                dropoff,
                Direction::Northbound
            );
            Direction::Northbound
        })
    }

    /// The hops travelled from `pickup` to `dropoff` in traversal order.
    ///
    /// Empty if either stop is not on the route (or both are the same stop). Callers treat an
    /// empty list as "no capacity constraint applies".
    pub fn segments_between(&self, pickup: &StopId, dropoff: &StopId) -> Vec<Segment> {
        let (Some(i), Some(j)) = (self.index_of(pickup), self.index_of(dropoff)) else {
            warn!(
                "No segments for {:?} -> {:?}: stop not on route",
                pickup, dropoff
            );
            return Vec::new();
        };
        if j >= i {
            self.stops[i..=j]
                .windows(2)
                .map(|hop| Segment::new(hop[0].clone(), hop[1].clone()))
                .collect()
        } else {
            self.stops[j..=i]
                .windows(2)
                .rev()
                .map(|hop| Segment::new(hop[1].clone(), hop[0].clone()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    fn route() -> Route {
        Route::new(["S1", "S2", "S3", "S4"].map(StopId::new))
    }

    fn seg(from: &str, to: &str) -> Segment {
        Segment::new(StopId::new(from), StopId::new(to))
    }

    #[test]
    fn direction_follows_route_index() {
        let route = route();
        let s1 = StopId::new("S1");
        let s3 = StopId::new("S3");
        assert_eq!(route.direction(&s1, &s3), Direction::Northbound);
        assert_eq!(route.direction(&s3, &s1), Direction::Southbound);
        assert_eq!(route.try_direction(&s1, &StopId::new("X")), None);
        assert_eq!(
            route.direction(&StopId::new("X"), &s1),
            Direction::Northbound
        );
    }

    #[test]
    fn segments_walk_in_both_directions() {
        let route = route();
        assert_eq!(
            route.segments_between(&StopId::new("S1"), &StopId::new("S3")),
            vec![seg("S1", "S2"), seg("S2", "S3")]
        );
        assert_eq!(
            route.segments_between(&StopId::new("S4"), &StopId::new("S2")),
            vec![seg("S4", "S3"), seg("S3", "S2")]
        );
        assert!(route
            .segments_between(&StopId::new("S2"), &StopId::new("S2"))
            .is_empty());
        assert!(route
            .segments_between(&StopId::new("S1"), &StopId::new("nowhere"))
            .is_empty());
    }

    #[test]
    fn reversed_segments_match_reverse_trip() {
        let route = route();
        for (a, b) in route.stops().iter().tuple_combinations() {
            let forward = route.segments_between(a, b);
            let backward = route.segments_between(b, a);
            let swapped = forward.iter().rev().map(Segment::reversed).collect_vec();
            assert_eq!(swapped, backward, "{:?} <-> {:?}", a, b);
        }
    }

    #[test]
    fn repeated_stop_keeps_first_position() {
        let route = Route::new(["A", "B", "A", "C"].map(StopId::new));
        assert_eq!(route.len(), 3);
        assert_eq!(route.index_of(&StopId::new("C")), Some(2));
    }

    #[test]
    fn segment_text_form() {
        let segment = seg("stop1", "stop4");
        assert_eq!(segment.to_string(), "stop1|stop4");
        assert_eq!(Segment::parse("stop1|stop4"), Some(segment));
        assert_eq!(Segment::parse("stop1"), None);
        assert_eq!(Segment::parse("|stop4"), None);
    }
}

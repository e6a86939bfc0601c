use std::fmt::{Debug, Display};

use itertools::Itertools;
use log::warn;
use serde::Deserialize;

use crate::col::{map_new, HashMap};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopId(Box<str>);

impl StopId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for StopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("s#{}", self.0))
    }
}

impl Display for StopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StopId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StopId {
    fn from(id: String) -> Self {
        Self(id.into_boxed_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Roughly 25 mph.
const SHUTTLE_SPEED_METERS_PER_SECOND: f64 = 11.0;

impl Coordinate {
    /// Great-circle distance using the haversine formula.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        EARTH_RADIUS_METERS * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Minutes until a shuttle covering `distance_meters` at cruising speed arrives, rounded.
pub fn eta_minutes(distance_meters: f64) -> u32 {
    let seconds = distance_meters / SHUTTLE_SPEED_METERS_PER_SECOND;
    (seconds / 60.0).round() as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub title: String,
    pub position: Coordinate,
    pub order: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct StopRow {
    #[serde(rename = "# stop_id")]
    stop_id: String,
    title: String,
    latitude: f64,
    longitude: f64,
    order: u32,
}

/// Read-only lookup of the stops served by the line. Loaded once.
#[derive(Debug, Clone, Default)]
pub struct StopRegistry {
    stops: HashMap<StopId, Stop>,
}

impl StopRegistry {
    pub fn new(stops: impl IntoIterator<Item = Stop>) -> Self {
        let mut by_id = map_new();
        for stop in stops {
            if let Some(previous) = by_id.insert(stop.id.clone(), stop) {
                warn!("Duplicate stop {:?} in registry, keeping the later one", previous.id);
            }
        }
        Self { stops: by_id }
    }

    pub fn get(&self, id: &StopId) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops sorted by their `order`, ties broken by id so the result is deterministic.
    pub fn by_order(&self) -> Vec<&Stop> {
        self.stops
            .values()
            .sorted_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)))
            .collect_vec()
    }
}

fn reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).delimiter(b';');

    builder
}

pub fn parse_stops(stream: impl std::io::Read) -> Result<StopRegistry, csv::Error> {
    let rows = reader()
        .from_reader(stream)
        .deserialize()
        .collect::<Result<Vec<StopRow>, csv::Error>>()?;
    Ok(StopRegistry::new(rows.into_iter().map(|row| Stop {
        id: StopId::from(row.stop_id),
        title: row.title,
        position: Coordinate {
            latitude: row.latitude,
            longitude: row.longitude,
        },
        order: row.order,
    })))
}

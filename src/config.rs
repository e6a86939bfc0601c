use std::fmt::Display;

use chrono::FixedOffset;
use itertools::Itertools;
use log::warn;

use crate::col::HashMap;
use crate::primitives::Seats;
use crate::route::{Direction, Route};
use crate::schedule::{utc, ParseSlotError, TimeSlot};
use crate::stop::{StopId, StopRegistry};

/// The departures offered in each direction.
#[derive(Debug, Clone)]
pub struct SlotTable {
    northbound: Vec<TimeSlot>,
    southbound: Vec<TimeSlot>,
}

impl SlotTable {
    pub fn new(northbound: Vec<TimeSlot>, southbound: Vec<TimeSlot>) -> Self {
        Self {
            northbound,
            southbound,
        }
    }

    pub fn slots(&self, direction: Direction) -> &[TimeSlot] {
        match direction {
            Direction::Northbound => &self.northbound,
            Direction::Southbound => &self.southbound,
        }
    }

    pub fn find(&self, direction: Direction, label: &str) -> Option<&TimeSlot> {
        let label = label.trim();
        self.slots(direction)
            .iter()
            .find(|slot| slot.label().eq_ignore_ascii_case(label))
    }
}

/// Everything the engine needs to know about a deployment. Passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub route: Route,
    pub capacity: Seats,
    pub slots: SlotTable,
    /// Offset of the service's local time; day-buckets and slot times are local.
    pub utc_offset: FixedOffset,
}

fn parse_slots<'a>(
    labels: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<TimeSlot>, ParseSlotError> {
    labels
        .into_iter()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(TimeSlot::parse)
        .collect()
}

impl ServiceConfig {
    /// The nine-stop, five-seat line the service was first deployed with.
    pub fn reference() -> Self {
        let route = Route::new(
            [
                "stop1", "stop4", "stop2", "stop5", "stop6", "stop7", "stop8", "stop3", "stop9",
            ]
            .map(StopId::new),
        );
        let northbound = ["7:00 AM", "8:00 AM", "4:00 PM", "5:00 PM"];
        let southbound = ["6:30 AM", "7:30 AM", "3:30 PM", "4:30 PM"];
        Self {
            route,
            capacity: 5,
            slots: SlotTable::new(
                parse_slots(northbound).unwrap_or_default(),
                parse_slots(southbound).unwrap_or_default(),
            ),
            utc_offset: utc(),
        }
    }
}

#[derive(Debug)]
pub enum ParseConfigError {
    CsvError(csv::Error),
    MissingKey(Box<str>),
    InvalidValue(Box<str>),
    InvalidSlot {
        label: Box<str>,
        error: ParseSlotError,
    },
}

impl Display for ParseConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseConfigError::CsvError(it) => write!(f, "could not read config: {}", it),
            ParseConfigError::MissingKey(key) => write!(f, "missing config key `{}`", key),
            ParseConfigError::InvalidValue(msg) => f.write_str(msg),
            ParseConfigError::InvalidSlot { label, error } => {
                write!(f, "invalid time slot `{}`: {}", label, error)
            }
        }
    }
}

impl std::error::Error for ParseConfigError {}

impl From<csv::Error> for ParseConfigError {
    fn from(value: csv::Error) -> Self {
        ParseConfigError::CsvError(value)
    }
}

fn reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).delimiter(b';');

    builder
}

fn slot_list(
    key_value_map: &mut HashMap<String, String>,
    key: &str,
) -> Result<Vec<TimeSlot>, ParseConfigError> {
    let value = key_value_map
        .remove(key)
        .ok_or(ParseConfigError::MissingKey(key.into()))?;
    value
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| {
            TimeSlot::parse(label).map_err(|error| ParseConfigError::InvalidSlot {
                label: label.into(),
                error,
            })
        })
        .collect()
}

/// Reads a `key;value` config file.
///
/// Keys: `capacity`, `route` (comma separated stop ids), `northbound_slots`, `southbound_slots`
/// (comma separated labels) and optionally `utc_offset_minutes`. Without a `route` key the order
/// is taken from the registry's `order` column.
pub fn parse_config(
    stream: impl std::io::Read,
    registry: Option<&StopRegistry>,
) -> Result<ServiceConfig, ParseConfigError> {
    let key_value_pairs = reader()
        .from_reader(stream)
        .deserialize()
        .collect::<Result<Box<[(String, String)]>, csv::Error>>()?;
    let mut key_value_map: HashMap<String, String> = key_value_pairs.iter().cloned().collect();

    let capacity = key_value_map
        .remove("capacity")
        .ok_or(ParseConfigError::MissingKey("capacity".into()))?
        .parse::<Seats>()
        .ok()
        .filter(|it| *it > 0)
        .ok_or_else(|| {
            ParseConfigError::InvalidValue("Value of capacity must be a positive integer!".into())
        })?;

    let route = match (key_value_map.remove("route"), registry) {
        (Some(route), _) => Route::new(
            route
                .split(',')
                .map(str::trim)
                .filter(|it| !it.is_empty())
                .map(StopId::new),
        ),
        (None, Some(registry)) => {
            Route::new(registry.by_order().into_iter().map(|it| it.id.clone()))
        }
        (None, None) => return Err(ParseConfigError::MissingKey("route".into())),
    };
    if route.is_empty() {
        return Err(ParseConfigError::InvalidValue("The route has no stops!".into()));
    }
    if let Some(registry) = registry {
        let unknown = route
            .stops()
            .iter()
            .filter(|it| registry.get(it).is_none())
            .collect_vec();
        if !unknown.is_empty() {
            warn!("Route stops missing from the stop registry: {:?}", unknown);
        }
    }

    let northbound = slot_list(&mut key_value_map, "northbound_slots")?;
    let southbound = slot_list(&mut key_value_map, "southbound_slots")?;

    let utc_offset = match key_value_map.remove("utc_offset_minutes") {
        None => utc(),
        Some(minutes) => minutes
            .parse::<i32>()
            .ok()
            .and_then(|it| FixedOffset::east_opt(it * 60))
            .ok_or_else(|| {
                ParseConfigError::InvalidValue(
                    "Could not parse value of utc_offset_minutes!".into(),
                )
            })?,
    };

    for key in key_value_map.keys() {
        warn!("Ignoring unknown config key `{}`", key);
    }

    Ok(ServiceConfig {
        route,
        capacity,
        slots: SlotTable::new(northbound, southbound),
        utc_offset,
    })
}

//! Domain data structures for bins, coordinates, and stitched routes.

use std::fmt;

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// Fill level at or above which a bin counts as overloaded unless configured otherwise.
pub const DEFAULT_THRESHOLD: FillLevel = FillLevel(80);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Reasons a coordinate, fill level, or bin reading is rejected.
pub enum ValidationError {
    /// Latitude is not a finite value within [-90, 90].
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    /// Longitude is not a finite value within [-180, 180].
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
    /// Fill percentage is outside [0, 100].
    #[error("fill level {0}% outside [0, 100]")]
    FillLevel(i64),
    /// Reading carries no usable name.
    #[error("bin name is empty")]
    EmptyName,
    /// Source entry did not match the reading schema.
    #[error("unreadable entry: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
/// Geographic position in degrees, always within valid latitude/longitude ranges.
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = ValidationError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl GeoPoint {
    /// Build a point from latitude and longitude.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when either axis is out of range or not finite.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Latitude in degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let from = Point::new(self.lon, self.lat);
        let to = Point::new(other.lon, other.lat);
        from.haversine_distance(&to) / 1000.0
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
/// Fill percentage of a bin, 0 to 100 inclusive.
pub struct FillLevel(u8);

impl FillLevel {
    /// Validate a raw percentage.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::FillLevel`] when the value is outside 0..=100.
    pub fn new(percent: i64) -> Result<Self, ValidationError> {
        u8::try_from(percent)
            .ok()
            .filter(|value| *value <= 100)
            .map(Self)
            .ok_or(ValidationError::FillLevel(percent))
    }

    /// The percentage as an integer.
    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for FillLevel {
    type Error = ValidationError;

    fn try_from(percent: i64) -> Result<Self, Self::Error> {
        FillLevel::new(percent)
    }
}

impl From<FillLevel> for u8 {
    fn from(level: FillLevel) -> Self {
        level.0
    }
}

impl Default for FillLevel {
    fn default() -> Self {
        DEFAULT_THRESHOLD
    }
}

impl fmt::Display for FillLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}%", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Unvalidated bin measurement as delivered by a data source.
pub struct BinReading {
    /// Site name reported by the source.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Fill percentage.
    pub fill: i64,
}

#[derive(Debug, Clone, PartialEq)]
/// One entry of a source's answer, before validation.
pub enum SourceEntry {
    /// Entry decoded into a reading.
    Reading(BinReading),
    /// Entry that could not be decoded, kept as raw text.
    Unreadable {
        /// The entry as received.
        raw: String,
        /// Decoder message.
        detail: String,
    },
}

impl SourceEntry {
    /// The decoded reading, if any.
    #[must_use]
    pub fn reading(&self) -> Option<&BinReading> {
        match self {
            SourceEntry::Reading(reading) => Some(reading),
            SourceEntry::Unreadable { .. } => None,
        }
    }
}

impl From<BinReading> for SourceEntry {
    fn from(reading: BinReading) -> Self {
        SourceEntry::Reading(reading)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Validated waste bin for one refresh cycle.
pub struct Bin {
    /// Site name used in popups and listings.
    pub name: String,
    /// Where the bin stands.
    pub location: GeoPoint,
    /// Current fill level.
    pub fill: FillLevel,
}

impl TryFrom<BinReading> for Bin {
    type Error = ValidationError;

    fn try_from(reading: BinReading) -> Result<Self, Self::Error> {
        let name = reading.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            name: name.to_owned(),
            location: GeoPoint::new(reading.lat, reading.lon)?,
            fill: FillLevel::new(reading.fill)?,
        })
    }
}

impl TryFrom<SourceEntry> for Bin {
    type Error = ValidationError;

    fn try_from(entry: SourceEntry) -> Result<Self, Self::Error> {
        match entry {
            SourceEntry::Reading(reading) => Bin::try_from(reading),
            SourceEntry::Unreadable { detail, .. } => Err(ValidationError::Unreadable(detail)),
        }
    }
}

impl Bin {
    /// Whether the bin meets or exceeds `threshold`.
    #[must_use]
    pub fn is_overloaded(&self, threshold: FillLevel) -> bool {
        self.fill >= threshold
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Outcome of asking the routing service for one leg.
pub enum RouteLeg {
    /// Road geometry in travel order.
    Available(Vec<GeoPoint>),
    /// The service could not supply a path.
    Unavailable,
}

impl RouteLeg {
    /// Whether road geometry was obtained.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, RouteLeg::Available(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
/// Continuous polyline covering all legs of one refresh cycle.
pub struct Path {
    points: Vec<GeoPoint>,
    fallback_legs: usize,
}

impl Path {
    /// Path consisting of a single point and no legs.
    #[must_use]
    pub fn single(point: GeoPoint) -> Self {
        Self {
            points: vec![point],
            fallback_legs: 0,
        }
    }

    /// Vertices in travel order.
    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// First vertex, if any.
    #[must_use]
    pub fn start(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    /// Last vertex, if any.
    #[must_use]
    pub fn end(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the path has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of legs drawn as straight lines because routing failed.
    #[must_use]
    pub fn fallback_legs(&self) -> usize {
        self.fallback_legs
    }

    /// Total length along the vertices in kilometres.
    #[must_use]
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .filter_map(|pair| match pair {
                [from, to] => Some(from.distance_km(to)),
                _ => None,
            })
            .sum()
    }

    /// Append a leg, dropping any vertex that repeats the one before it.
    ///
    /// This covers the join with the previous leg as well as repeated vertices
    /// inside the leg itself.
    pub(crate) fn extend_leg(&mut self, leg: &[GeoPoint]) {
        for point in leg {
            if self.points.last() != Some(point) {
                self.points.push(*point);
            }
        }
    }

    pub(crate) fn record_fallback(&mut self) {
        self.fallback_legs += 1;
    }
}

/// Built-in bin data sources.
pub enum BinSources {
    /// Randomized demo readings.
    Simulated,
    /// Live telemetry feed over HTTP.
    Telemetry,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a registered bin source.
pub struct SourceId(pub String);

impl fmt::Display for BinSources {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            BinSources::Simulated => "simulated",
            BinSources::Telemetry => "telemetry",
        };
        write!(formatter, "{slug}")
    }
}

impl From<BinSources> for SourceId {
    fn from(source: BinSources) -> Self {
        SourceId(source.to_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a bin source and its human-friendly name.
pub struct SourceMeta {
    /// Unique identifier.
    pub id: SourceId,
    /// Display name.
    pub name: String,
}

//! In-memory ports shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::model::{BinReading, BinSources, GeoPoint, RouteLeg, SourceEntry, SourceMeta};
use crate::ports::{BinPort, PortError, RoutePort};

pub(crate) fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).expect("valid test point")
}

pub(crate) fn reading(name: &str, lat: f64, lon: f64, fill: i64) -> BinReading {
    BinReading {
        name: name.to_owned(),
        lat,
        lon,
        fill,
    }
}

/// Router answering from a fixed table; unknown legs are unavailable.
#[derive(Default)]
pub(crate) struct ScriptedRoutes {
    legs: Vec<(GeoPoint, GeoPoint, Vec<GeoPoint>)>,
    calls: AtomicUsize,
}

impl ScriptedRoutes {
    pub(crate) fn with_leg(mut self, start: GeoPoint, end: GeoPoint, points: Vec<GeoPoint>) -> Self {
        self.legs.push((start, end, points));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutePort for ScriptedRoutes {
    async fn leg(&self, start: GeoPoint, end: GeoPoint) -> RouteLeg {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.legs
            .iter()
            .find(|(from, to, _)| *from == start && *to == end)
            .map_or(RouteLeg::Unavailable, |(_, _, points)| {
                RouteLeg::Available(points.clone())
            })
    }
}

/// Bin source returning the same entries every cycle, or failing.
pub(crate) struct StaticBins {
    meta: SourceMeta,
    entries: Option<Vec<SourceEntry>>,
}

impl StaticBins {
    pub(crate) fn new(readings: Vec<BinReading>) -> Self {
        Self::with_entries(readings.into_iter().map(SourceEntry::from).collect())
    }

    pub(crate) fn with_entries(entries: Vec<SourceEntry>) -> Self {
        Self {
            meta: SourceMeta {
                id: BinSources::Simulated.into(),
                name: "Static".to_owned(),
            },
            entries: Some(entries),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            entries: None,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl BinPort for StaticBins {
    fn source(&self) -> &SourceMeta {
        &self.meta
    }

    async fn readings(&self) -> Result<Vec<SourceEntry>, PortError> {
        self.entries
            .clone()
            .ok_or_else(|| PortError::Internal("feed offline".to_owned()))
    }
}

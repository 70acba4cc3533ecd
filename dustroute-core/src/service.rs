//! High-level refresh cycle combining a bin source with a router.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::{info, instrument};

use crate::model::{Bin, FillLevel, GeoPoint, Path, SourceMeta};
use crate::ports::{BinPort, PortError, RoutePort};
use crate::select::{RejectedReading, ingest, overloaded, waypoints};
use crate::stitch::RouteStitcher;

#[derive(thiserror::Error, Debug)]
/// Errors that abort a refresh cycle before a report exists.
pub enum RefreshError {
    /// The bin source could not deliver readings.
    #[error("Bin source failed: {0}")]
    Source(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Fixed parameters of every refresh cycle.
pub struct RouteSettings {
    /// Depot where every route starts.
    pub base: GeoPoint,
    /// Fill level at or above which a bin is visited.
    pub threshold: FillLevel,
}

#[derive(Debug, Clone, PartialEq)]
/// Whether the cycle produced a route.
pub enum RouteState {
    /// No bin is overloaded; nothing to collect.
    AllClear,
    /// A route through the overloaded bins.
    Route {
        /// Base station followed by the overloaded bins, in visiting order.
        waypoints: Vec<GeoPoint>,
        /// Stitched driving path.
        path: Path,
    },
}

#[derive(Debug, Clone)]
/// Everything a single refresh cycle produced.
pub struct RefreshReport {
    /// Source the readings came from.
    pub source: SourceMeta,
    /// Valid bins in discovery order.
    pub bins: Vec<Bin>,
    /// Readings dropped during validation.
    pub rejected: Vec<RejectedReading>,
    /// Parameters the cycle ran with.
    pub settings: RouteSettings,
    /// Route or all-clear state.
    pub route: RouteState,
    /// When the cycle finished.
    pub generated_at: DateTime<Local>,
}

impl RefreshReport {
    /// Overloaded bins in visiting order.
    pub fn overloaded(&self) -> impl Iterator<Item = &Bin> {
        overloaded(&self.bins, self.settings.threshold)
    }

    /// Stitched path, when a route exists.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.route {
            RouteState::Route { path, .. } => Some(path),
            RouteState::AllClear => None,
        }
    }

    /// Visiting order, which is just the base station when all clear.
    #[must_use]
    pub fn waypoints(&self) -> Vec<GeoPoint> {
        match &self.route {
            RouteState::Route { waypoints, .. } => waypoints.clone(),
            RouteState::AllClear => vec![self.settings.base],
        }
    }

    /// Whether no bin needs collecting.
    #[must_use]
    pub fn is_all_clear(&self) -> bool {
        matches!(self.route, RouteState::AllClear)
    }
}

/// Public entry point running refresh cycles.
pub struct DustrouteService {
    bins: Arc<dyn BinPort>,
    stitcher: RouteStitcher,
    settings: RouteSettings,
}

impl DustrouteService {
    /// Create a service reading bins from `bins` and routing through `router`.
    #[must_use]
    pub fn new(bins: Arc<dyn BinPort>, router: Arc<dyn RoutePort>, settings: RouteSettings) -> Self {
        Self {
            bins,
            stitcher: RouteStitcher::new(router),
            settings,
        }
    }

    /// Parameters every cycle runs with.
    #[must_use]
    pub fn settings(&self) -> RouteSettings {
        self.settings
    }

    /// Metadata of the bin source in use.
    #[must_use]
    pub fn source(&self) -> &SourceMeta {
        self.bins.source()
    }

    /// Run one cycle: read bins, select overloaded ones, and stitch the route.
    ///
    /// Routing problems never fail the cycle; they degrade to straight segments.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Source`] when the bin source cannot deliver readings.
    #[instrument(skip(self), fields(source = %self.bins.source().id))]
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();
        let entries = self.bins.readings().await?;
        let ingested = ingest(entries);

        let stops = waypoints(self.settings.base, &ingested.bins, self.settings.threshold);
        let route = if stops.len() > 1 {
            let path = self.stitcher.stitch(&stops).await;
            info!(
                stops = stops.len() - 1,
                points = path.len(),
                fallback_legs = path.fallback_legs(),
                length_km = path.length_km(),
                "route stitched"
            );
            RouteState::Route {
                waypoints: stops,
                path,
            }
        } else {
            info!("no overloaded bins");
            RouteState::AllClear
        };

        info!(
            bins = ingested.bins.len(),
            rejected = ingested.rejected.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "refresh cycle finished"
        );

        Ok(RefreshReport {
            source: self.bins.source().clone(),
            bins: ingested.bins,
            rejected: ingested.rejected,
            settings: self.settings,
            route,
            generated_at: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceEntry;
    use crate::testing::{ScriptedRoutes, StaticBins, point, reading};

    fn settings() -> RouteSettings {
        RouteSettings {
            base: point(16.705, 74.243),
            threshold: FillLevel::default(),
        }
    }

    #[tokio::test]
    async fn end_to_end_single_overloaded_bin() {
        let bins = StaticBins::new(vec![
            reading("hot", 16.70, 74.24, 90),
            reading("calm", 16.71, 74.25, 50),
        ]);
        let routes = Arc::new(ScriptedRoutes::default());
        let service = DustrouteService::new(Arc::new(bins), Arc::<ScriptedRoutes>::clone(&routes), settings());

        let report = service.refresh().await.expect("refresh succeeds");

        let target = point(16.70, 74.24);
        assert_eq!(report.waypoints(), vec![settings().base, target]);
        assert_eq!(routes.calls(), 1);
        let path = report.path().expect("route exists");
        assert_eq!(path.start(), Some(settings().base));
        assert_eq!(path.end(), Some(target));
        let names: Vec<&str> = report.overloaded().map(|bin| bin.name.as_str()).collect();
        assert_eq!(names, vec!["hot"]);
    }

    #[tokio::test]
    async fn fetched_geometry_ends_exactly_at_bin() {
        let base = settings().base;
        let target = point(16.70, 74.24);
        let routes = ScriptedRoutes::default().with_leg(
            base,
            target,
            vec![base, point(16.703, 74.241), target],
        );
        let bins = StaticBins::new(vec![reading("hot", 16.70, 74.24, 90)]);
        let service = DustrouteService::new(Arc::new(bins), Arc::new(routes), settings());

        let report = service.refresh().await.expect("refresh succeeds");

        let path = report.path().expect("route exists");
        assert_eq!(path.len(), 3);
        assert_eq!(path.end(), Some(target));
        assert_eq!(path.fallback_legs(), 0);
    }

    #[tokio::test]
    async fn no_overload_is_all_clear() {
        let bins = StaticBins::new(vec![reading("calm", 16.71, 74.25, 79)]);
        let routes = Arc::new(ScriptedRoutes::default());
        let service = DustrouteService::new(Arc::new(bins), Arc::<ScriptedRoutes>::clone(&routes), settings());

        let report = service.refresh().await.expect("refresh succeeds");

        assert!(report.is_all_clear(), "expected all clear");
        assert!(report.path().is_none(), "all clear should have no path");
        assert_eq!(report.waypoints(), vec![settings().base]);
        assert_eq!(routes.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_readings_are_reported_not_routed() {
        let bins = StaticBins::new(vec![
            reading("broken", 160.0, 74.24, 90),
            reading("hot", 16.70, 74.24, 85),
        ]);
        let service =
            DustrouteService::new(Arc::new(bins), Arc::new(ScriptedRoutes::default()), settings());

        let report = service.refresh().await.expect("refresh succeeds");

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.bins.len(), 1);
        assert_eq!(report.waypoints().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_entry_does_not_abort_cycle() {
        let bins = StaticBins::with_entries(vec![
            reading("hot", 16.70, 74.24, 91).into(),
            SourceEntry::Unreadable {
                raw: r#"{"name":"bad","fill":87.5}"#.to_owned(),
                detail: "invalid type: floating point `87.5`, expected i64".to_owned(),
            },
        ]);
        let service =
            DustrouteService::new(Arc::new(bins), Arc::new(ScriptedRoutes::default()), settings());

        let report = service.refresh().await.expect("refresh succeeds");

        assert_eq!(report.bins.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.path().is_some(), "valid bin still routed");
    }

    #[tokio::test]
    async fn source_failure_is_an_error() {
        let service = DustrouteService::new(
            Arc::new(StaticBins::failing()),
            Arc::new(ScriptedRoutes::default()),
            settings(),
        );

        let result = service.refresh().await;

        assert!(matches!(result, Err(RefreshError::Source(_))));
    }

    #[tokio::test]
    async fn repeated_cycles_select_same_waypoints() {
        let bins = StaticBins::new(vec![
            reading("a", 16.6950, 74.2375, 88),
            reading("b", 16.7045, 74.2425, 61),
            reading("c", 16.7100, 74.2600, 93),
        ]);
        let service =
            DustrouteService::new(Arc::new(bins), Arc::new(ScriptedRoutes::default()), settings());

        let first = service.refresh().await.expect("first refresh");
        let second = service.refresh().await.expect("second refresh");

        assert_eq!(first.route, second.route);
    }
}

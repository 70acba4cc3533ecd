//! Concatenation of per-leg road geometry into one continuous path.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{GeoPoint, Path, RouteLeg};
use crate::ports::RoutePort;

/// Builds the driving path through a list of waypoints, one leg at a time.
pub struct RouteStitcher {
    router: Arc<dyn RoutePort>,
}

impl RouteStitcher {
    /// Create a stitcher fetching legs from `router`.
    #[must_use]
    pub fn new(router: Arc<dyn RoutePort>) -> Self {
        Self { router }
    }

    /// Fetch every leg between consecutive waypoints and join them in order.
    ///
    /// Legs the router cannot supply become straight segments between the two
    /// waypoints. Vertices that repeat their predecessor are dropped at every
    /// join, for fetched and straight legs alike. A single waypoint yields a
    /// one-point path; no waypoints yield an empty path.
    pub async fn stitch(&self, waypoints: &[GeoPoint]) -> Path {
        let Some(first) = waypoints.first() else {
            debug!("no waypoints to stitch");
            return Path::default();
        };

        let mut path = Path::single(*first);

        for (index, pair) in waypoints.windows(2).enumerate() {
            let [start, end] = pair else {
                continue;
            };

            match self.router.leg(*start, *end).await {
                RouteLeg::Available(points) if !points.is_empty() => {
                    debug!(leg = index, points = points.len(), "fetched road geometry");
                    path.extend_leg(&anchor(points, *start, *end));
                }
                _ => {
                    warn!(leg = index, %start, %end, "routing unavailable, using straight segment");
                    path.record_fallback();
                    path.extend_leg(&[*start, *end]);
                }
            }
        }

        path
    }
}

// Routers snap endpoints to the road network; pin the leg to the exact waypoints.
fn anchor(mut points: Vec<GeoPoint>, start: GeoPoint, end: GeoPoint) -> Vec<GeoPoint> {
    if points.first() != Some(&start) {
        points.insert(0, start);
    }
    if points.last() != Some(&end) {
        points.push(end);
    }
    points
}

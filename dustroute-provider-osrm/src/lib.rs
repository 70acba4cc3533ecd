//! Routing provider backed by the OSRM `route` service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use dustroute_core::{
    model::{GeoPoint, RouteLeg},
    ports::{PortError, RoutePort},
};

/// Public OSRM demo server.
pub const DEFAULT_BASE_URL: &str = "http://router.project-osrm.org";
/// Routing profile for garbage trucks.
pub const DEFAULT_PROFILE: &str = "driving";

const OK_CODE: &str = "Ok";
const NO_ROUTE_CODE: &str = "NoRoute";

/// Response from /route/v1/{profile}/{coordinates}
#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteEntry>,
    // waypoints are ignored, the snapped locations show up in the geometry anyway
}

/// Single candidate route
#[derive(Debug, Deserialize)]
struct RouteEntry {
    geometry: Geometry,
}

/// GeoJSON `LineString`, requested via geometries=geojson
#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<[f64; 2]>, // [lon, lat]
}

#[derive(Debug, Clone)]
/// Where and how to query OSRM.
pub struct OsrmSettings {
    /// Server root without trailing path, e.g. `http://router.project-osrm.org`.
    pub base_url: String,
    /// Routing profile segment of the URL.
    pub profile: String,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Delay before the first retry; doubled for every further one.
    pub backoff: Duration,
}

impl Default for OsrmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            profile: DEFAULT_PROFILE.to_owned(),
            retries: 0,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Route leg lookup against an OSRM server.
pub struct OsrmRoutePort {
    client: Client,
    settings: OsrmSettings,
}

impl OsrmRoutePort {
    /// Create a routing port bound to the given HTTP client.
    ///
    /// Request timeouts are taken from the client.
    #[must_use]
    pub fn new(client: Client, settings: OsrmSettings) -> Self {
        Self { client, settings }
    }

    fn route_url(&self, start: GeoPoint, end: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.profile,
            start.lon(),
            start.lat(),
            end.lon(),
            end.lat(),
        )
    }

    async fn try_leg(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, PortError> {
        let req = self
            .client
            .get(self.route_url(start, end))
            .query(&[("overview", "full"), ("geometries", "geojson")]);

        let response = fetch_json::<RouteResponse>(req).await?;
        decode_route(response)
    }
}

#[async_trait]
impl RoutePort for OsrmRoutePort {
    async fn leg(&self, start: GeoPoint, end: GeoPoint) -> RouteLeg {
        let mut attempt = 0;
        loop {
            match self.try_leg(start, end).await {
                Ok(points) => {
                    debug!(%start, %end, points = points.len(), "osrm route");
                    return RouteLeg::Available(points);
                }
                Err(err) if attempt < self.settings.retries && is_transient(&err) => {
                    let delay = self
                        .settings
                        .backoff
                        .saturating_mul(2_u32.saturating_pow(attempt));
                    warn!(%start, %end, attempt, ?delay, %err, "osrm request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(%start, %end, %err, "osrm route unavailable");
                    return RouteLeg::Unavailable;
                }
            }
        }
    }
}

/// Build the routing port as a shareable trait object.
#[must_use]
pub fn router(client: Client, settings: OsrmSettings) -> Arc<dyn RoutePort> {
    Arc::new(OsrmRoutePort::new(client, settings))
}

/// Turn a decoded response into (lat, lon) points of the first route.
fn decode_route(response: RouteResponse) -> Result<Vec<GeoPoint>, PortError> {
    if response.code != OK_CODE {
        if response.code == NO_ROUTE_CODE {
            return Err(PortError::NoRoute);
        }
        let message = response.message.unwrap_or_default();
        return Err(PortError::Malformed(format!("{}: {message}", response.code)));
    }

    let route = response.routes.into_iter().next().ok_or(PortError::NoRoute)?;
    if route.geometry.coordinates.is_empty() {
        return Err(PortError::Malformed("route without geometry".to_owned()));
    }

    route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| GeoPoint::new(lat, lon).map_err(PortError::from))
        .collect()
}

// Timeouts, refused connections, and 5xx answers may go away on their own.
// Bodies that fail to decode will not.
fn is_transient(err: &PortError) -> bool {
    match err {
        PortError::Network(inner) => match inner.status() {
            Some(status) => status.is_server_error(),
            None => inner.is_timeout() || inner.is_connect() || inner.is_request(),
        },
        _ => false,
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

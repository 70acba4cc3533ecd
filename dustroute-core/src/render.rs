//! Self-contained HTML map of a refresh report.
//!
//! The document loads Leaflet from its CDN and embeds all report data as a
//! JSON literal, so the file can be opened directly in a browser.

use std::fs;
use std::io::Error as IoError;
use std::path::{Path as FsPath, PathBuf};

use serde::Serialize;
use serde_json::Error as JsonError;

use crate::model::GeoPoint;
use crate::service::RefreshReport;

const DATA_PLACEHOLDER: &str = "__DUSTROUTE_DATA__";
const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M:%S";
const ZOOM: u8 = 14;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while producing the map document.
pub enum RenderError {
    /// Report data could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] JsonError),
    /// Document could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

#[derive(Debug, Serialize)]
struct BinMarker {
    position: [f64; 2],
    name: String,
    fill: u8,
    overloaded: bool,
}

#[derive(Debug, Serialize)]
struct RouteLayer {
    path: Vec<[f64; 2]>,
    stops: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
struct MapData {
    base: [f64; 2],
    zoom: u8,
    bins: Vec<BinMarker>,
    route: Option<RouteLayer>,
    updated: String,
}

/// Map document ready to be serialized to HTML.
#[derive(Debug)]
pub struct MapDocument {
    data: MapData,
}

fn lat_lon(point: GeoPoint) -> [f64; 2] {
    [point.lat(), point.lon()]
}

impl MapDocument {
    /// Build the map layers for `report`.
    #[must_use]
    pub fn from_report(report: &RefreshReport) -> Self {
        let threshold = report.settings.threshold;
        let bins = report
            .bins
            .iter()
            .map(|bin| BinMarker {
                position: lat_lon(bin.location),
                name: bin.name.clone(),
                fill: bin.fill.percent(),
                overloaded: bin.is_overloaded(threshold),
            })
            .collect();

        let route = report.path().map(|path| RouteLayer {
            path: path.points().iter().copied().map(lat_lon).collect(),
            stops: report.waypoints().into_iter().map(lat_lon).collect(),
        });

        Self {
            data: MapData {
                base: lat_lon(report.settings.base),
                zoom: ZOOM,
                bins,
                route,
                updated: report.generated_at.format(TIMESTAMP_FORMAT).to_string(),
            },
        }
    }

    /// Whether the document draws a route polyline.
    #[must_use]
    pub fn has_route(&self) -> bool {
        self.data.route.is_some()
    }

    /// Render the complete HTML document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Encode`] when the map data cannot be serialized.
    pub fn to_html(&self) -> Result<String, RenderError> {
        // "</" inside the JSON literal would close the script element early.
        let json = serde_json::to_string(&self.data)?.replace("</", "<\\/");
        Ok(TEMPLATE.replace(DATA_PLACEHOLDER, &json))
    }

    /// Write the document to `target`, replacing any previous version atomically.
    ///
    /// Returns the absolute path of the written file.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] when encoding fails or the file cannot be written.
    pub fn write_to(&self, target: &FsPath) -> Result<PathBuf, RenderError> {
        let html = self.to_html()?;
        let staging = target.with_extension("html.tmp");
        fs::write(&staging, html)?;
        fs::rename(&staging, target)?;
        Ok(fs::canonicalize(target)?)
    }
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>dustroute</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; }
  .stop-label { font-size: 12px; color: blue; font-weight: bold; }
</style>
</head>
<body>
<div id="map"></div>
<script>
const data = __DUSTROUTE_DATA__;

function escapeHtml(text) {
  const node = document.createElement("div");
  node.textContent = text;
  return node.innerHTML;
}

const map = L.map("map").setView(data.base, data.zoom);
L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);

for (const bin of data.bins) {
  const color = bin.overloaded ? "red" : "green";
  L.circleMarker(bin.position, { radius: 9, color: color, fillColor: color, fillOpacity: 0.8 })
    .bindPopup(escapeHtml(bin.name) + "<br>Fill: " + bin.fill + "%")
    .addTo(map);
}

if (data.route) {
  L.polyline(data.route.path, { color: "blue", weight: 5 }).addTo(map);
  data.route.stops.forEach((stop, index) => {
    L.marker(stop, {
      icon: L.divIcon({ className: "stop-label", html: "<div>" + (index + 1) + "</div>" })
    }).addTo(map);
  });
} else {
  L.circleMarker(data.base, { radius: 12, color: "green", fillColor: "green", fillOpacity: 0.9 })
    .bindPopup("No overloaded bins.")
    .addTo(map);
}

L.marker(data.base)
  .bindPopup("Last updated: " + escapeHtml(data.updated))
  .addTo(map);
</script>
</body>
</html>
"#;

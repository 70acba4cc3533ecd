//! Bin source reading fill levels from a live HTTP telemetry feed.
//!
//! The feed answers `GET {url}` with a JSON array of
//! `{ "name": "...", "lat": 16.7, "lon": 74.2, "fill": 87 }` objects.
//! Entries that do not match that shape are passed on as unreadable, so one
//! broken sensor does not hide the others.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use dustroute_core::{
    model::{BinReading, BinSources, SourceEntry, SourceMeta},
    plugin::SourcePlugin,
    ports::{BinPort, PortError},
};

/// Single bin entry of the feed
#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(alias = "id")]
    name: String,
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
    #[serde(alias = "fill_level")]
    fill: i64,
}

impl From<FeedEntry> for BinReading {
    fn from(entry: FeedEntry) -> Self {
        BinReading {
            name: entry.name,
            lat: entry.lat,
            lon: entry.lon,
            fill: entry.fill,
        }
    }
}

/// Bin source backed by the telemetry feed.
pub struct TelemetryBinPort {
    client: Client,
    url: String,
    meta: SourceMeta,
}

impl TelemetryBinPort {
    /// Create a source polling `url` with the given HTTP client.
    #[must_use]
    pub fn new<U: Into<String>>(client: Client, url: U) -> Self {
        Self {
            client,
            url: url.into(),
            meta: source_meta(),
        }
    }
}

#[async_trait]
impl BinPort for TelemetryBinPort {
    fn source(&self) -> &SourceMeta {
        &self.meta
    }

    async fn readings(&self) -> Result<Vec<SourceEntry>, PortError> {
        let values = fetch_json::<Vec<Value>>(self.client.get(&self.url)).await?;
        debug!(url = %self.url, bins = values.len(), "telemetry feed read");
        Ok(values.iter().map(decode_entry).collect())
    }
}

fn decode_entry(value: &Value) -> SourceEntry {
    match FeedEntry::deserialize(value) {
        Ok(entry) => SourceEntry::Reading(entry.into()),
        Err(err) => SourceEntry::Unreadable {
            raw: value.to_string(),
            detail: err.to_string(),
        },
    }
}

/// Build the plugin bundle for the telemetry source.
#[must_use]
pub fn plugin<U: Into<String>>(client: Client, url: U) -> SourcePlugin {
    SourcePlugin::new(Arc::new(TelemetryBinPort::new(client, url)))
}

fn source_meta() -> SourceMeta {
    SourceMeta {
        id: BinSources::Telemetry.into(),
        name: String::from("Live telemetry"),
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

//! Bin source producing randomized fill levels for a fixed set of demo sites.
//!
//! Stands in for a telemetry feed during demos and development. With a seed
//! the sequence of readings is reproducible.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use dustroute_core::{
    model::{BinReading, BinSources, SourceEntry, SourceMeta},
    plugin::SourcePlugin,
    ports::{BinPort, PortError},
};

/// Fill percentages drawn for every site and cycle.
pub const FILL_RANGE: RangeInclusive<i64> = 60..=95;

#[derive(Debug, Clone, Copy, PartialEq)]
/// A named bin location.
pub struct Site {
    /// Display name.
    pub name: &'static str,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Demo bins around Kolhapur.
pub const KOLHAPUR_SITES: [Site; 6] = [
    Site {
        name: "Mahalaxmi Temple",
        lat: 16.6950,
        lon: 74.2375,
    },
    Site {
        name: "Rankala Lake",
        lat: 16.7045,
        lon: 74.2425,
    },
    Site {
        name: "Govt. College of Engineering",
        lat: 16.7055,
        lon: 74.2460,
    },
    Site {
        name: "City Railway Station",
        lat: 16.7100,
        lon: 74.2600,
    },
    Site {
        name: "Chhatrapati Shahu Stadium",
        lat: 16.7200,
        lon: 74.2470,
    },
    Site {
        name: "New Palace",
        lat: 16.7050,
        lon: 74.2550,
    },
];

/// Randomized bin source.
pub struct SimulatedBinPort {
    meta: SourceMeta,
    sites: Vec<Site>,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedBinPort {
    /// Simulate the Kolhapur demo sites.
    ///
    /// Without a seed every run produces different readings.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_sites(KOLHAPUR_SITES.to_vec(), seed)
    }

    /// Simulate an arbitrary list of sites.
    #[must_use]
    pub fn with_sites(sites: Vec<Site>, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            meta: source_meta(),
            sites,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl BinPort for SimulatedBinPort {
    fn source(&self) -> &SourceMeta {
        &self.meta
    }

    async fn readings(&self) -> Result<Vec<SourceEntry>, PortError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_poisoned| PortError::Internal("simulator state poisoned".to_owned()))?;

        Ok(self
            .sites
            .iter()
            .map(|site| {
                SourceEntry::from(BinReading {
                    name: site.name.to_owned(),
                    lat: site.lat,
                    lon: site.lon,
                    fill: rng.gen_range(FILL_RANGE),
                })
            })
            .collect())
    }
}

/// Build the plugin bundle for the simulated source.
#[must_use]
pub fn plugin(seed: Option<u64>) -> SourcePlugin {
    SourcePlugin::new(Arc::new(SimulatedBinPort::new(seed)))
}

fn source_meta() -> SourceMeta {
    SourceMeta {
        id: BinSources::Simulated.into(),
        name: String::from("Simulated sensors"),
    }
}

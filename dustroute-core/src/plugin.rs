//! Registry for bin data sources selectable at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{SourceId, SourceMeta};
use crate::ports::{BinPort, PortError};

/// A bin source together with its metadata.
pub struct SourcePlugin {
    /// Static metadata describing the source.
    pub meta: SourceMeta,
    /// Implementation producing bin readings.
    pub bin_port: Arc<dyn BinPort>,
}

impl SourcePlugin {
    /// Wrap a port, taking the metadata from the port itself.
    #[must_use]
    pub fn new(bin_port: Arc<dyn BinPort>) -> Self {
        Self {
            meta: bin_port.source().clone(),
            bin_port,
        }
    }
}

/// Registry that resolves bin sources by identifier.
pub struct SourceRegistry {
    plugins: HashMap<SourceId, SourcePlugin>,
}

impl SourceRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<SourcePlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.meta.id.clone(), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Metadata for all registered sources, sorted by id.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceMeta> {
        let mut sources: Vec<SourceMeta> = self
            .plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect();
        sources.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        sources
    }

    /// Look up the port for the given source.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedSource`] when no source is registered under `id`.
    pub fn bin_port(&self, id: &SourceId) -> Result<Arc<dyn BinPort>, PortError> {
        self.plugins
            .get(id)
            .map(|plugin| Arc::clone(&plugin.bin_port))
            .ok_or(PortError::UnsupportedSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BinSources;
    use crate::testing::StaticBins;

    #[test]
    fn resolves_registered_sources_only() {
        let registry = SourceRegistry::new(vec![SourcePlugin::new(Arc::new(StaticBins::new(
            Vec::new(),
        )))]);

        assert!(
            registry.bin_port(&BinSources::Simulated.into()).is_ok(),
            "simulated source missing"
        );
        assert!(matches!(
            registry.bin_port(&BinSources::Telemetry.into()),
            Err(PortError::UnsupportedSource)
        ));
        assert_eq!(registry.sources().len(), 1);
    }
}

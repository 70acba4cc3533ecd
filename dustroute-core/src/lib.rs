//! Core types and service wiring for the dustroute bin collection planner.

/// Domain models: coordinates, bins, legs, and stitched paths.
pub mod model;
/// Registry for plugging bin data sources into the service.
pub mod plugin;
/// Traits describing the routing and bin source interfaces.
pub mod ports;
/// Self-contained HTML map rendering of a refresh report.
pub mod render;
/// Cooperative refresh scheduling with superseding of stale cycles.
pub mod scheduler;
/// Ingestion and overload selection of bins.
pub mod select;
/// High-level refresh cycle used by clients.
pub mod service;
/// Concatenation of per-leg geometries into one path.
pub mod stitch;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use render::*;
pub use scheduler::*;
pub use select::*;
pub use service::*;
pub use stitch::*;

#[cfg(test)]
mod testing;

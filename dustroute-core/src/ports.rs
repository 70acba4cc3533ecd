//! Traits describing routing and bin source capabilities and shared error types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{GeoPoint, RouteLeg, SourceEntry, SourceMeta, ValidationError};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to external backends.
pub enum PortError {
    /// Network layer failed or the backend answered with an error status.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Backend responded with data that violates the expected schema.
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// A coordinate in the response is out of range.
    #[error("Invalid coordinate: {0}")]
    Validation(#[from] ValidationError),
    /// The routing backend found no route between the two points.
    #[error("No route found")]
    NoRoute,
    /// No bin source is registered under the requested id.
    #[error("Unsupported bin source")]
    UnsupportedSource,
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Trait for routing backends that supply road geometry between two points.
pub trait RoutePort: Send + Sync {
    /// Fetch the driving path from `start` to `end`.
    ///
    /// Implementations never fail: every problem is reported as
    /// [`RouteLeg::Unavailable`].
    async fn leg(&self, start: GeoPoint, end: GeoPoint) -> RouteLeg;
}

#[async_trait]
/// Trait for backends producing the current set of bin readings.
pub trait BinPort: Send + Sync {
    /// Metadata describing this source.
    fn source(&self) -> &SourceMeta;

    /// Produce the entries for one refresh cycle, in discovery order.
    ///
    /// Single entries that do not decode are returned as
    /// [`SourceEntry::Unreadable`] instead of failing the whole answer.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend cannot be reached or its answer
    /// as a whole cannot be decoded.
    async fn readings(&self) -> Result<Vec<SourceEntry>, PortError>;
}

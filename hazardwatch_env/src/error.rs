//! Error types for the HazardWatch position source layer.

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a position source.
///
/// These are surfaced to the caller unchanged. The tracking engine never
/// retries on the source's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The platform refused access to location data
    #[error("Location permission denied")]
    PermissionDenied,

    /// The sensor or the source itself cannot deliver fixes
    #[error("Position source unavailable: {0}")]
    Unavailable(String),

    /// No fix was acquired within the configured acquisition timeout
    #[error("No fix acquired within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The producing side of the source has shut down
    #[error("Position source closed")]
    Closed,
}

impl SourceError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Returns true if the source may still deliver fixes after this error.
    ///
    /// A timeout only means the sensor was slow; the subscription stays open.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

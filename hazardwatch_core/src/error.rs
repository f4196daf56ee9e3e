//! Error types for HazardWatch core.

use hazardwatch_env::SourceError;
use thiserror::Error;

/// Invalid zone catalog or engine configuration.
///
/// Fatal at startup: a malformed catalog must never be used.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Zone '{zone}' has non-positive radius {radius}m")]
    NonPositiveRadius { zone: String, radius: f64 },

    #[error("Zone '{zone}' has invalid center ({latitude}, {longitude})")]
    InvalidCenter {
        zone: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("Duplicate zone id: {0}")]
    DuplicateZoneId(String),

    #[error("Unknown severity level: {0}")]
    UnknownSeverity(String),

    #[error("Trail capacity must be at least 1")]
    ZeroTrailCapacity,

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a single position fix was dropped.
///
/// Recovered locally: the engine keeps its previous state and continues
/// with the next fix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixRejected {
    #[error("Latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("Non-finite coordinate ({latitude}, {longitude})")]
    NonFiniteCoordinate { latitude: f64, longitude: f64 },

    #[error("Timestamp went backwards: {received_ms}ms < {previous_ms}ms")]
    TimestampRegression { previous_ms: u64, received_ms: u64 },
}

/// Failures when binding a tracking session to a source.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is already attached to a source")]
    AlreadyAttached,

    #[error("Session has been torn down")]
    TornDown,

    #[error("Source refused subscription: {0}")]
    Source(#[from] SourceError),
}

//! Common types for the HazardWatch source abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single position sample delivered by a source.
///
/// Coordinates are WGS84 decimal degrees. The timestamp is milliseconds since
/// the Unix epoch on the source's clock; it must not go backwards within one
/// source, but repeated values are allowed.
///
/// No validation happens here. Range checks belong to the tracking engine so
/// that a corrupt fix can be rejected without tearing down the stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Latitude in degrees, valid range [-90, 90]
    pub latitude: f64,

    /// Longitude in degrees, valid range [-180, 180]
    pub longitude: f64,

    /// Acquisition time (Unix milliseconds)
    pub timestamp_ms: u64,
}

impl PositionFix {
    /// Creates a new fix.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }
}

impl std::fmt::Display for PositionFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.7}, {:.7}) @ {}ms",
            self.latitude, self.longitude, self.timestamp_ms
        )
    }
}

/// Unique identifier for a source subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Creates a new random SubscriptionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic SubscriptionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

//! Static zone configuration.
//!
//! The catalog is described in JSON:
//!
//! ```json
//! {
//!   "zones": [
//!     { "id": "core", "latitude": 19.0493847, "longitude": 72.8941718,
//!       "radius_meters": 150, "severity": "very_high" }
//!   ]
//! }
//! ```
//!
//! Parsing only checks shape. Range and radius checks happen in
//! [`ZoneCatalog::from_config`](crate::ZoneCatalog::from_config).

use crate::error::ConfigurationError;
use crate::zones::{Severity, BUILTIN_ZONES};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One zone as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub severity: Severity,
}

/// The full catalog configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub zones: Vec<ZoneSpec>,
}

impl CatalogConfig {
    /// Configuration of the three zones of the reference deployment.
    pub fn builtin() -> Self {
        let zones = BUILTIN_ZONES
            .iter()
            .map(|&(id, name, latitude, longitude, radius_meters, severity)| ZoneSpec {
                id: id.to_string(),
                name: Some(name.to_string()),
                latitude,
                longitude,
                radius_meters,
                severity,
            })
            .collect();
        Self { zones }
    }

    /// Parses configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigurationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

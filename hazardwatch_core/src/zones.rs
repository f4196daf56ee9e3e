//! Hazard zone catalog.
//!
//! A [`ZoneCatalog`] is built once from configuration and never changes for
//! the lifetime of a session. Construction validates every zone; after that
//! no operation on the catalog can fail.

use crate::config::{CatalogConfig, ZoneSpec};
use crate::error::ConfigurationError;
use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Points whose signed gap to a zone edge is at most this many metres count
/// as on the boundary, and therefore inside.
///
/// Absorbs the last-bit rounding of the trigonometry so a point placed
/// exactly on a boundary is classified the same on every platform. The test
/// is therefore `distance - radius <= 1e-6` rather than a bare
/// `distance <= radius`; a micrometre is far below the 0.5 m tolerance that
/// distance results are compared at.
pub const BOUNDARY_EPSILON_M: f64 = 1e-6;

/// Zones of the reference deployment: (id, name, latitude, longitude, radius, severity).
pub(crate) const BUILTIN_ZONES: [(&str, &str, f64, f64, f64, Severity); 3] = [
    ("high-north-west", "North-west embankment", 19.051, 72.890, 200.0, Severity::High),
    ("moderate-east", "East market", 19.048, 72.898, 250.0, Severity::Moderate),
    ("very-high-core", "Core hazard site", 19.0493847, 72.8941718, 150.0, Severity::VeryHigh),
];

// ============================================================================
// SEVERITY
// ============================================================================

/// Hazard level of a zone, ordered from least to most severe.
///
/// Display-only: containment logic never looks at it.
///
/// Serializes as snake_case (`very_high`). Deserializing goes through
/// [`FromStr`], so display labels such as `"Very High"` load too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Severity {
    Moderate,
    High,
    VeryHigh,
}

impl Severity {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::VeryHigh => "Very High",
        }
    }

    /// Style hint for renderers drawing the zone overlay.
    pub fn style_hint(&self) -> &'static str {
        match self {
            Severity::Moderate => "yellow",
            Severity::High => "orange",
            Severity::VeryHigh => "red",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "moderate" => Ok(Severity::Moderate),
            "high" => Ok(Severity::High),
            "veryhigh" => Ok(Severity::VeryHigh),
            _ => Err(ConfigurationError::UnknownSeverity(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// HAZARD ZONE
// ============================================================================

/// A circular hazard zone. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardZone {
    id: Arc<str>,
    name: Option<String>,
    center: Coordinate,
    radius_meters: f64,
    severity: Severity,
}

impl HazardZone {
    /// Creates a validated zone.
    ///
    /// # Errors
    /// * `NonPositiveRadius` - radius is zero, negative, or not finite
    /// * `InvalidCenter` - center outside the valid coordinate ranges
    pub fn new(
        id: impl Into<String>,
        center: Coordinate,
        radius_meters: f64,
        severity: Severity,
    ) -> Result<Self, ConfigurationError> {
        let id: String = id.into();
        if !(radius_meters.is_finite() && radius_meters > 0.0) {
            return Err(ConfigurationError::NonPositiveRadius {
                zone: id,
                radius: radius_meters,
            });
        }
        if !center.is_valid() {
            return Err(ConfigurationError::InvalidCenter {
                zone: id,
                latitude: center.latitude,
                longitude: center.longitude,
            });
        }
        Ok(Self {
            id: id.into(),
            name: None,
            center,
            radius_meters,
            severity,
        })
    }

    /// Attaches a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Signed distance from `point` to this zone's edge.
    /// Negative inside, positive outside.
    #[inline]
    pub fn signed_gap(&self, point: &Coordinate) -> f64 {
        self.center.distance_to(point) - self.radius_meters
    }

    /// Boundary-inclusive containment test.
    #[inline]
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.signed_gap(point) <= BOUNDARY_EPSILON_M
    }
}

impl TryFrom<&ZoneSpec> for HazardZone {
    type Error = ConfigurationError;

    fn try_from(spec: &ZoneSpec) -> Result<Self, Self::Error> {
        let zone = HazardZone::new(
            spec.id.clone(),
            Coordinate::new(spec.latitude, spec.longitude),
            spec.radius_meters,
            spec.severity,
        )?;
        Ok(match &spec.name {
            Some(name) => zone.with_name(name.clone()),
            None => zone,
        })
    }
}

// ============================================================================
// CONTAINMENT RESULT
// ============================================================================

/// The zone whose edge is closest to a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestZone {
    /// Position of the zone in catalog order
    pub index: usize,

    /// Id of that zone, shared with the catalog
    pub zone_id: Arc<str>,

    /// Distance to the zone edge, floored at zero (metres)
    pub gap_meters: f64,
}

/// Result of evaluating one point against the whole catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Containment {
    /// True if any zone contains the point (boundary inclusive)
    pub inside_any_zone: bool,

    /// Closest zone edge; `None` for an empty catalog
    pub nearest: Option<NearestZone>,

    /// Highest severity among the zones containing the point
    pub active_severity: Option<Severity>,
}

impl Containment {
    /// Distance to the nearest zone boundary, zero when inside.
    pub fn nearest_boundary_distance_meters(&self) -> Option<f64> {
        self.nearest.as_ref().map(|n| n.gap_meters)
    }
}

// ============================================================================
// ZONE CATALOG
// ============================================================================

/// Immutable, ordered collection of hazard zones.
///
/// Cloning is cheap; clones share the same zones.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCatalog {
    zones: Arc<[HazardZone]>,
}

impl ZoneCatalog {
    /// Builds a catalog from already-validated zones.
    ///
    /// # Errors
    /// * `DuplicateZoneId` - two zones share an id
    pub fn new(zones: Vec<HazardZone>) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        for zone in &zones {
            if !seen.insert(zone.id()) {
                return Err(ConfigurationError::DuplicateZoneId(zone.id().to_string()));
            }
        }
        Ok(Self {
            zones: zones.into(),
        })
    }

    /// Builds and validates a catalog from configuration.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigurationError> {
        let zones = config
            .zones
            .iter()
            .map(HazardZone::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(zones)
    }

    /// The three zones of the reference deployment.
    pub fn builtin() -> Self {
        let zones: Vec<HazardZone> = BUILTIN_ZONES
            .iter()
            .map(|&(id, name, latitude, longitude, radius_meters, severity)| HazardZone {
                id: Arc::from(id),
                name: Some(name.to_string()),
                center: Coordinate::new(latitude, longitude),
                radius_meters,
                severity,
            })
            .collect();
        Self {
            zones: zones.into(),
        }
    }

    /// A catalog with no zones.
    pub fn empty() -> Self {
        Self {
            zones: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone at `index` in catalog order.
    pub fn get(&self, index: usize) -> Option<&HazardZone> {
        self.zones.get(index)
    }

    /// Looks a zone up by id.
    pub fn find(&self, id: &str) -> Option<&HazardZone> {
        self.zones.iter().find(|z| z.id() == id)
    }

    /// Iterates zones in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, HazardZone> {
        self.zones.iter()
    }

    /// Every zone containing `point`, in catalog order.
    pub fn containing(&self, point: &Coordinate) -> Vec<(usize, &HazardZone)> {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.contains(point))
            .collect()
    }

    /// Evaluates `point` against every zone. O(number of zones).
    ///
    /// The nearest zone is the one with the smallest signed gap (deepest
    /// inside wins among containing zones). Exact ties keep the earliest
    /// zone in catalog order.
    pub fn evaluate(&self, point: &Coordinate) -> Containment {
        let mut inside_any_zone = false;
        let mut active_severity: Option<Severity> = None;
        let mut best: Option<(usize, f64)> = None;

        for (index, zone) in self.zones.iter().enumerate() {
            let gap = zone.signed_gap(point);

            if gap <= BOUNDARY_EPSILON_M {
                inside_any_zone = true;
                active_severity = active_severity.max(Some(zone.severity));
            }

            match best {
                Some((_, best_gap)) if gap >= best_gap => {}
                _ => best = Some((index, gap)),
            }
        }

        let nearest = best.map(|(index, gap)| NearestZone {
            index,
            zone_id: self.zones[index].id.clone(),
            gap_meters: if gap <= BOUNDARY_EPSILON_M { 0.0 } else { gap },
        });

        Containment {
            inside_any_zone,
            nearest,
            active_severity,
        }
    }
}

impl<'a> IntoIterator for &'a ZoneCatalog {
    type Item = &'a HazardZone;
    type IntoIter = std::slice::Iter<'a, HazardZone>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

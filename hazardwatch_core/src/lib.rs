//! HazardWatch Core - Geofence Evaluation and Trail Accumulation
//!
//! Consumes a live stream of position fixes and evaluates each one against a
//! fixed catalog of circular hazard zones:
//! 1. **Inside flag**: is the latest position inside any zone (boundary inclusive)?
//! 2. **Nearest boundary**: how far is the closest zone edge (zero when inside)?
//! 3. **Trail**: every accepted position, in arrival order
//!
//! The catalog is immutable for a session. Rendering, tile fetching and page
//! layout live elsewhere; this crate only turns fixes into state.

pub mod config;
pub mod error;
pub mod geo;
pub mod session;
pub mod tracking;
pub mod zones;

// Re-export key types for convenience
pub use config::{CatalogConfig, ZoneSpec};
pub use error::{ConfigurationError, FixRejected, SessionError};
pub use geo::{destination_point, haversine_distance_m, initial_bearing_deg, Coordinate, EARTH_MEAN_RADIUS_M};
pub use hazardwatch_env::{PositionFix, PositionSource, SourceError, SourceOptions};
pub use session::{SessionEvent, TrackingSession};
pub use tracking::{EngineConfig, FixOutcome, TrackState, TrackSummary, TrackView, TrackingEngine, ZoneTransition};
pub use zones::{Containment, HazardZone, NearestZone, Severity, ZoneCatalog, BOUNDARY_EPSILON_M};

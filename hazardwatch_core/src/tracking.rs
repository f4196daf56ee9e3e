//! The "TRACKING" Engine - Geofence Evaluation and Trail Accumulation
//!
//! Turns a serialized stream of position fixes into authoritative track
//! state:
//! 1. Validation (coordinate ranges, timestamp monotonicity)
//! 2. Trail append (arrival order, optional capacity)
//! 3. Containment (haversine distance to every zone, boundary inclusive)
//! 4. Transition detection (entered / exited any zone)
//!
//! A rejected fix leaves every piece of state exactly as it was, so the
//! inside/outside alert never flips because of one bad sample.

use crate::error::{ConfigurationError, FixRejected};
use crate::geo::Coordinate;
use crate::zones::{Containment, NearestZone, Severity, ZoneCatalog};
use hazardwatch_env::PositionFix;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the TrackingEngine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum trail length (default: `None` = unbounded).
    ///
    /// When set, the oldest entries are evicted once the trail is full and
    /// counted in `evicted_count`. Without a capacity nothing is ever dropped.
    pub trail_capacity: Option<usize>,
}

// ============================================================================
// OUTPUTS
// ============================================================================

/// Change of the "inside any zone" flag caused by an accepted fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneTransition {
    /// Was outside (or had no fix), now inside
    Entered,
    /// Was inside, now outside
    Exited,
}

/// What an accepted fix did to the derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct FixOutcome {
    pub containment: Containment,
    pub transition: Option<ZoneTransition>,
    /// Trail length after the append
    pub trail_len: usize,
}

/// Owned copy of the full track state, trail included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackState {
    pub trail: Vec<PositionFix>,
    pub last_fix: Option<PositionFix>,
    pub inside_any_zone: bool,
    pub nearest_boundary_distance_meters: Option<f64>,
    pub nearest_zone: Option<NearestZone>,
    pub active_severity: Option<Severity>,
}

/// Constant-size digest of the track state for alert banners and info panels.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackSummary {
    pub last_fix: Option<PositionFix>,
    pub inside_any_zone: bool,
    pub nearest_boundary_distance_meters: Option<f64>,
    pub nearest_zone: Option<NearestZone>,
    pub active_severity: Option<Severity>,
    pub trail_len: usize,
    pub accepted_count: u64,
    pub rejected_count: u64,
}

impl TrackSummary {
    /// Nearest-boundary distance with one decimal, `None` before the first fix
    /// or with an empty catalog.
    pub fn distance_label(&self) -> Option<String> {
        self.last_fix?;
        self.nearest_boundary_distance_meters
            .map(|d| format!("{d:.1}"))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Maintains trail and containment state for one tracking session.
///
/// The engine is the sole writer of its state. Callers serialize access
/// (one fix at a time); `&mut self` on [`on_fix`](Self::on_fix) makes that a
/// compile-time guarantee for single-owner use.
#[derive(Debug, Clone)]
pub struct TrackingEngine {
    catalog: ZoneCatalog,
    config: EngineConfig,

    trail: VecDeque<PositionFix>,
    last_fix: Option<PositionFix>,
    containment: Containment,

    accepted_count: u64,
    rejected_count: u64,
    evicted_count: u64,
}

impl TrackingEngine {
    /// Creates an engine with an unbounded trail.
    pub fn new(catalog: ZoneCatalog) -> Self {
        Self::build(catalog, EngineConfig::default())
    }

    /// Creates an engine with explicit configuration.
    ///
    /// # Errors
    /// * `ZeroTrailCapacity` - `trail_capacity` is `Some(0)`
    pub fn with_config(catalog: ZoneCatalog, config: EngineConfig) -> Result<Self, ConfigurationError> {
        if config.trail_capacity == Some(0) {
            return Err(ConfigurationError::ZeroTrailCapacity);
        }
        Ok(Self::build(catalog, config))
    }

    fn build(catalog: ZoneCatalog, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            trail: VecDeque::new(),
            last_fix: None,
            containment: Containment::default(),
            accepted_count: 0,
            rejected_count: 0,
            evicted_count: 0,
        }
    }

    /// Checks a fix against the current state without applying it.
    pub fn validate(&self, fix: &PositionFix) -> Result<(), FixRejected> {
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            return Err(FixRejected::NonFiniteCoordinate {
                latitude: fix.latitude,
                longitude: fix.longitude,
            });
        }
        if !(-90.0..=90.0).contains(&fix.latitude) {
            return Err(FixRejected::LatitudeOutOfRange(fix.latitude));
        }
        if !(-180.0..=180.0).contains(&fix.longitude) {
            return Err(FixRejected::LongitudeOutOfRange(fix.longitude));
        }
        if let Some(last) = &self.last_fix {
            if fix.timestamp_ms < last.timestamp_ms {
                return Err(FixRejected::TimestampRegression {
                    previous_ms: last.timestamp_ms,
                    received_ms: fix.timestamp_ms,
                });
            }
        }
        Ok(())
    }

    /// Processes one fix.
    ///
    /// # Returns
    /// * `Ok(FixOutcome)` - Fix appended, derived state recomputed
    /// * `Err(FixRejected)` - Fix dropped, state untouched; keep feeding fixes
    pub fn on_fix(&mut self, fix: PositionFix) -> Result<FixOutcome, FixRejected> {
        if let Err(reason) = self.validate(&fix) {
            self.rejected_count += 1;
            warn!(%fix, %reason, "fix rejected");
            return Err(reason);
        }

        let was_inside = self.containment.inside_any_zone;
        let containment = self.catalog.evaluate(&Coordinate::from(fix));

        if let Some(cap) = self.config.trail_capacity {
            while self.trail.len() >= cap {
                self.trail.pop_front();
                self.evicted_count += 1;
            }
        }
        self.trail.push_back(fix);
        self.last_fix = Some(fix);
        self.containment = containment.clone();
        self.accepted_count += 1;

        let transition = match (was_inside, containment.inside_any_zone) {
            (false, true) => Some(ZoneTransition::Entered),
            (true, false) => Some(ZoneTransition::Exited),
            _ => None,
        };

        match transition {
            Some(ZoneTransition::Entered) => info!(
                %fix,
                severity = ?containment.active_severity,
                "entered hazard zone"
            ),
            Some(ZoneTransition::Exited) => info!(
                %fix,
                distance_m = ?containment.nearest_boundary_distance_meters(),
                "left hazard zones"
            ),
            None => debug!(
                %fix,
                inside = containment.inside_any_zone,
                distance_m = ?containment.nearest_boundary_distance_meters(),
                "fix accepted"
            ),
        }

        Ok(FixOutcome {
            containment,
            transition,
            trail_len: self.trail.len(),
        })
    }

    /// Read-only view of the current state. O(1), no copying.
    pub fn current_state(&self) -> TrackView<'_> {
        TrackView { engine: self }
    }

    /// Owned copy of the current state, trail included. O(trail length).
    pub fn snapshot(&self) -> TrackState {
        TrackState {
            trail: self.trail.iter().copied().collect(),
            last_fix: self.last_fix,
            inside_any_zone: self.containment.inside_any_zone,
            nearest_boundary_distance_meters: self.containment.nearest_boundary_distance_meters(),
            nearest_zone: self.containment.nearest.clone(),
            active_severity: self.containment.active_severity,
        }
    }

    /// Constant-size digest of the current state.
    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            last_fix: self.last_fix,
            inside_any_zone: self.containment.inside_any_zone,
            nearest_boundary_distance_meters: self.containment.nearest_boundary_distance_meters(),
            nearest_zone: self.containment.nearest.clone(),
            active_severity: self.containment.active_severity,
            trail_len: self.trail.len(),
            accepted_count: self.accepted_count,
            rejected_count: self.rejected_count,
        }
    }

    /// Clears trail, derived state, and counters back to a fresh engine.
    pub fn reset(&mut self) {
        self.trail.clear();
        self.last_fix = None;
        self.containment = Containment::default();
        self.accepted_count = 0;
        self.rejected_count = 0;
        self.evicted_count = 0;
        debug!("tracking state reset");
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted_count
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    /// Trail entries dropped because of `trail_capacity`.
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }
}

/// Borrowed, read-only view of a [`TrackingEngine`]'s state.
#[derive(Debug, Clone, Copy)]
pub struct TrackView<'a> {
    engine: &'a TrackingEngine,
}

impl<'a> TrackView<'a> {
    pub fn last_fix(&self) -> Option<PositionFix> {
        self.engine.last_fix
    }

    /// Accepted fixes in arrival order.
    pub fn trail(&self) -> impl ExactSizeIterator<Item = &'a PositionFix> + DoubleEndedIterator + 'a {
        self.engine.trail.iter()
    }

    pub fn trail_len(&self) -> usize {
        self.engine.trail.len()
    }

    /// The `index`-th retained trail entry (0 = oldest).
    pub fn trail_get(&self, index: usize) -> Option<&'a PositionFix> {
        self.engine.trail.get(index)
    }

    pub fn inside_any_zone(&self) -> bool {
        self.engine.containment.inside_any_zone
    }

    /// Zero when inside or on a boundary, `None` with an empty catalog or
    /// before the first fix.
    pub fn nearest_boundary_distance_meters(&self) -> Option<f64> {
        self.engine.containment.nearest_boundary_distance_meters()
    }

    pub fn nearest_zone(&self) -> Option<NearestZone> {
        self.engine.containment.nearest.clone()
    }

    pub fn active_severity(&self) -> Option<Severity> {
        self.engine.containment.active_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, haversine_distance_m};
    use crate::zones::{HazardZone, Severity};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    const CORE: Coordinate = Coordinate {
        latitude: 19.0493847,
        longitude: 72.8941718,
    };

    fn core_catalog() -> ZoneCatalog {
        ZoneCatalog::new(vec![HazardZone::new("core", CORE, 150.0, Severity::VeryHigh).unwrap()]).unwrap()
    }

    fn fix_at(c: Coordinate, t: u64) -> PositionFix {
        PositionFix::new(c.latitude, c.longitude, t)
    }

    #[test]
    fn test_engine_starts_empty() {
        let engine = TrackingEngine::new(core_catalog());
        let state = engine.current_state();
        assert_eq!(state.trail_len(), 0);
        assert_eq!(state.last_fix(), None);
        assert!(!state.inside_any_zone());
        assert_eq!(state.nearest_boundary_distance_meters(), None);
    }

    #[test]
    fn test_fix_at_center_is_inside() {
        let mut engine = TrackingEngine::new(core_catalog());
        let outcome = engine.on_fix(fix_at(CORE, 0)).unwrap();

        assert!(outcome.containment.inside_any_zone);
        assert_eq!(outcome.transition, Some(ZoneTransition::Entered));
        let state = engine.current_state();
        assert!(state.inside_any_zone());
        assert_eq!(state.nearest_boundary_distance_meters(), Some(0.0));
    }

    #[test]
    fn test_fix_on_boundary_is_inside() {
        let mut engine = TrackingEngine::new(core_catalog());
        let edge = destination_point(&CORE, 135.0, 150.0);
        assert_abs_diff_eq!(haversine_distance_m(&CORE, &edge), 150.0, epsilon = 1e-6);

        engine.on_fix(fix_at(edge, 0)).unwrap();
        assert!(engine.current_state().inside_any_zone());
    }

    #[test]
    fn test_distance_outside_zone() {
        let mut engine = TrackingEngine::new(core_catalog());
        engine.on_fix(fix_at(destination_point(&CORE, 10.0, 162.5), 0)).unwrap();

        let state = engine.current_state();
        assert!(!state.inside_any_zone());
        assert_abs_diff_eq!(state.nearest_boundary_distance_meters().unwrap(), 12.5, epsilon = 1e-6);
        assert_eq!(state.nearest_zone().map(|n| n.zone_id.to_string()), Some("core".to_string()));
        assert_eq!(engine.summary().nearest_zone.map(|n| n.index), Some(0));
    }

    #[test]
    fn test_distance_non_decreasing_when_walking_away() {
        let mut engine = TrackingEngine::new(ZoneCatalog::builtin());
        let start = Coordinate::new(19.0493847, 72.8941718);
        let mut previous = 0.0;

        // Due south leaves every builtin zone behind
        for (i, step) in (0..200).map(|i| (i, i as f64 * 10.0)) {
            let p = destination_point(&start, 180.0, step);
            engine.on_fix(fix_at(p, i)).unwrap();
            let d = engine.current_state().nearest_boundary_distance_meters().unwrap();
            assert!(d >= previous, "step {i}: {d} < {previous}");
            previous = d;
        }
        assert!(previous > 1_000.0);
    }

    #[test]
    fn test_invalid_latitude_between_valid_fixes() {
        let mut engine = TrackingEngine::new(core_catalog());
        let first = fix_at(CORE, 10);
        let bad = PositionFix::new(200.0, 72.0, 20);
        let second = fix_at(destination_point(&CORE, 0.0, 500.0), 30);

        engine.on_fix(first).unwrap();
        assert_eq!(engine.on_fix(bad), Err(FixRejected::LatitudeOutOfRange(200.0)));
        engine.on_fix(second).unwrap();

        let state = engine.current_state();
        assert_eq!(state.trail_len(), 2);
        assert_eq!(state.trail().copied().collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(state.last_fix(), Some(second));
        assert!(!state.inside_any_zone());
        assert_eq!(engine.rejected_count(), 1);
    }

    #[test]
    fn test_rejection_keeps_alert_state() {
        let mut engine = TrackingEngine::new(core_catalog());
        engine.on_fix(fix_at(CORE, 10)).unwrap();
        let before = engine.snapshot();

        assert!(engine.on_fix(PositionFix::new(0.0, 500.0, 11)).is_err());
        assert!(engine.on_fix(PositionFix::new(f64::NAN, 0.0, 12)).is_err());
        assert_eq!(engine.snapshot(), before);
        assert!(engine.current_state().inside_any_zone());
    }

    #[test]
    fn test_timestamp_regression_rejected_equal_allowed() {
        let mut engine = TrackingEngine::new(core_catalog());
        engine.on_fix(fix_at(CORE, 100)).unwrap();

        assert!(engine.on_fix(fix_at(CORE, 100)).is_ok());
        assert_eq!(
            engine.on_fix(fix_at(CORE, 99)),
            Err(FixRejected::TimestampRegression {
                previous_ms: 100,
                received_ms: 99
            })
        );
        assert_eq!(engine.current_state().trail_len(), 2);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut engine = TrackingEngine::new(core_catalog());
        for t in 0..5 {
            engine.on_fix(fix_at(CORE, t)).unwrap();
        }
        engine.reset();
        engine.reset();

        let state = engine.current_state();
        assert_eq!(state.trail_len(), 0);
        assert_eq!(state.last_fix(), None);
        assert!(!state.inside_any_zone());
        assert_eq!(engine.summary(), TrackSummary::default());

        // Timestamps restart after reset
        assert!(engine.on_fix(fix_at(CORE, 0)).is_ok());
    }

    #[test]
    fn test_empty_catalog_never_inside() {
        let mut engine = TrackingEngine::new(ZoneCatalog::empty());
        for t in 0..10 {
            let outcome = engine.on_fix(PositionFix::new(t as f64, t as f64, t)).unwrap();
            assert_eq!(outcome.transition, None);
        }
        let state = engine.current_state();
        assert!(!state.inside_any_zone());
        assert_eq!(state.nearest_boundary_distance_meters(), None);
        assert_eq!(state.nearest_zone(), None);
    }

    #[test]
    fn test_transitions() {
        let mut engine = TrackingEngine::new(core_catalog());
        let outside = fix_at(destination_point(&CORE, 0.0, 400.0), 0);

        assert_eq!(engine.on_fix(outside).unwrap().transition, None);
        assert_eq!(engine.on_fix(fix_at(CORE, 1)).unwrap().transition, Some(ZoneTransition::Entered));
        assert_eq!(engine.on_fix(fix_at(CORE, 2)).unwrap().transition, None);
        let mut away = outside;
        away.timestamp_ms = 3;
        assert_eq!(engine.on_fix(away).unwrap().transition, Some(ZoneTransition::Exited));
    }

    #[test]
    fn test_current_state_is_deterministic() {
        let mut engine = TrackingEngine::new(ZoneCatalog::builtin());
        engine.on_fix(PositionFix::new(19.05, 72.895, 0)).unwrap();

        let a = engine.current_state().nearest_boundary_distance_meters().unwrap();
        let b = engine.current_state().nearest_boundary_distance_meters().unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(engine.snapshot(), engine.snapshot());
    }

    #[test]
    fn test_trail_capacity_evicts_oldest() {
        let config = EngineConfig {
            trail_capacity: Some(3),
        };
        let mut engine = TrackingEngine::with_config(core_catalog(), config).unwrap();
        for t in 0..5 {
            engine.on_fix(PositionFix::new(0.0, 0.0, t)).unwrap();
        }

        let times: Vec<u64> = engine.current_state().trail().map(|f| f.timestamp_ms).collect();
        assert_eq!(times, vec![2, 3, 4]);
        assert_eq!(engine.evicted_count(), 2);
        assert_eq!(engine.accepted_count(), 5);
    }

    #[test]
    fn test_zero_capacity_is_configuration_error() {
        let config = EngineConfig {
            trail_capacity: Some(0),
        };
        assert!(matches!(
            TrackingEngine::with_config(core_catalog(), config),
            Err(ConfigurationError::ZeroTrailCapacity)
        ));
    }

    #[test]
    fn test_distance_label() {
        let mut engine = TrackingEngine::new(core_catalog());
        assert_eq!(engine.summary().distance_label(), None);

        engine.on_fix(fix_at(destination_point(&CORE, 0.0, 162.5), 0)).unwrap();
        assert_eq!(engine.summary().distance_label().as_deref(), Some("12.5"));
    }

    fn arb_fix() -> impl Strategy<Value = (f64, f64)> {
        (-90.0f64..=90.0, -180.0f64..=180.0)
    }

    proptest! {
        #[test]
        fn prop_trail_matches_accepted_fixes(points in prop::collection::vec(arb_fix(), 0..64)) {
            let mut engine = TrackingEngine::new(ZoneCatalog::builtin());
            let fixes: Vec<PositionFix> = points
                .iter()
                .enumerate()
                .map(|(i, (lat, lon))| PositionFix::new(*lat, *lon, i as u64))
                .collect();

            for fix in &fixes {
                prop_assert!(engine.on_fix(*fix).is_ok());
            }

            let state = engine.current_state();
            prop_assert_eq!(state.trail_len(), fixes.len());
            for (i, fix) in fixes.iter().enumerate() {
                prop_assert_eq!(state.trail_get(i), Some(fix));
            }
        }

        #[test]
        fn prop_invalid_fixes_never_enter_trail(
            points in prop::collection::vec((arb_fix(), any::<bool>()), 1..64)
        ) {
            let mut engine = TrackingEngine::new(ZoneCatalog::builtin());
            let mut expected = Vec::new();

            for (i, ((lat, lon), corrupt)) in points.iter().enumerate() {
                let lat = if *corrupt { lat + 200.0 } else { *lat };
                let fix = PositionFix::new(lat, *lon, i as u64);
                let before = engine.summary();
                match engine.on_fix(fix) {
                    Ok(_) => expected.push(fix),
                    Err(_) => {
                        prop_assert!(*corrupt);
                        let after = engine.summary();
                        prop_assert_eq!(after.inside_any_zone, before.inside_any_zone);
                        prop_assert_eq!(after.last_fix, before.last_fix);
                    }
                }
            }

            let trail: Vec<PositionFix> = engine.current_state().trail().copied().collect();
            prop_assert_eq!(trail, expected);
        }
    }
}

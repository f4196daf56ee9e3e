//! Scenario runner - executes chaos engineering test scenarios.

use crate::context::SimContext;
use crate::exporter::{SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::walker::Walker;

use hazardwatch_core::{
    destination_point, initial_bearing_deg, haversine_distance_m, Coordinate, EngineConfig, HazardZone,
    SessionEvent, TrackingEngine, TrackingSession, ZoneCatalog,
};
use hazardwatch_env::{HazardContext, ManualSource, PositionFix, SourceError, SourceOptions};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioMetrics {
    /// Fixes handed to the source
    pub fixes_emitted: u64,

    /// Fixes the engine appended to the trail
    pub fixes_accepted: u64,

    /// Fixes the engine dropped
    pub fixes_rejected: u64,

    /// Failures reported by the source
    pub source_errors: u64,

    /// Outside -> inside transitions
    pub zone_entries: u64,

    /// Inside -> outside transitions
    pub zone_exits: u64,

    /// Trail length when the run ended
    pub final_trail_len: usize,

    /// Largest nearest-boundary distance observed (metres)
    pub max_nearest_distance_m: f64,
}

/// Seed salt for fault injection, so chaos never shifts the walker's noise.
const CHAOS_SALT: u64 = 0x5DEE_CE66_D1CE_4E5B;

/// How far outside the first zone a crossing starts (metres).
const APPROACH_MARGIN_M: f64 = 450.0;

/// Runs chaos scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    /// Zones the scenarios walk through
    catalog: ZoneCatalog,
}

impl ScenarioRunner {
    /// Creates a new scenario runner over the built-in zones.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 5,
            max_duration_secs: 10.0,
            catalog: ZoneCatalog::builtin(),
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Replaces the zone catalog.
    pub fn with_catalog(mut self, catalog: ZoneCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).0
    }

    /// Runs a scenario and records every tick for visualization.
    pub fn run_recorded(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true);
        let export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed, &self.catalog));
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let ticks = self.total_ticks();
        let setup = match scenario {
            ScenarioId::WalkThrough => self.setup_walk_through(record),
            ScenarioId::Departure => self.setup_departure(record),
            ScenarioId::GlitchStorm => self.setup_glitch_storm(record),
            ScenarioId::SensorDropout => self.setup_sensor_dropout(record),
            ScenarioId::LongHaul => self.setup_long_haul(record),
            ScenarioId::EmptyCatalog => self.setup_empty_catalog(record),
            ScenarioId::EarlyTeardown => self.setup_walk_through(record),
        };

        let mut harness = match setup {
            Ok(harness) => harness,
            Err(reason) => {
                warn!("Scenario {} could not start: {}", scenario.name(), reason);
                return (
                    ScenarioResult {
                        scenario,
                        seed: self.seed,
                        passed: false,
                        total_ticks: 0,
                        final_time_secs: 0.0,
                        failure_reason: Some(reason),
                        metrics: ScenarioMetrics::default(),
                    },
                    None,
                );
            }
        };

        if let Some(export) = harness.export.as_mut() {
            export.scenario = scenario.name().to_string();
        }

        let outcome = match scenario {
            ScenarioId::WalkThrough => run_walk_through(&mut harness, ticks),
            ScenarioId::Departure => run_departure(&mut harness, ticks),
            ScenarioId::GlitchStorm => run_glitch_storm(&mut harness, ticks, self.seed ^ CHAOS_SALT),
            ScenarioId::SensorDropout => run_sensor_dropout(&mut harness, ticks),
            ScenarioId::LongHaul => run_long_haul(&mut harness, ticks),
            ScenarioId::EmptyCatalog => run_empty_catalog(&mut harness, ticks),
            ScenarioId::EarlyTeardown => run_early_teardown(&mut harness, ticks),
        };

        let (metrics, total_ticks, final_time_secs, export) = harness.finish(&outcome);
        match &outcome {
            Ok(()) => info!(
                "Scenario {} complete: {} fixes, {} accepted, {} entries, {} exits",
                scenario.name(),
                metrics.fixes_emitted,
                metrics.fixes_accepted,
                metrics.zone_entries,
                metrics.zone_exits
            ),
            Err(reason) => warn!("Scenario {} failed: {}", scenario.name(), reason),
        }

        (
            ScenarioResult {
                scenario,
                seed: self.seed,
                passed: outcome.is_ok(),
                total_ticks,
                final_time_secs,
                failure_reason: outcome.err(),
                metrics,
            },
            export,
        )
    }

    fn total_ticks(&self) -> u64 {
        ((self.max_duration_secs * self.tick_rate_hz as f64).ceil() as u64).max(1)
    }

    fn dt(&self) -> f64 {
        1.0 / self.tick_rate_hz as f64
    }

    fn physics_seed(&self) -> u64 {
        self.seed.wrapping_mul(0x9e3779b97f4a7c15)
    }

    fn first_zone(&self) -> Result<&HazardZone, String> {
        self.catalog
            .get(0)
            .ok_or_else(|| "scenario needs at least one zone".to_string())
    }

    /// A walker that crosses the first zone north to south over the run.
    fn crossing_walker(&self) -> Result<Walker, String> {
        let zone = self.first_zone()?;
        let offset = zone.radius_meters() + APPROACH_MARGIN_M;
        let start = destination_point(&zone.center(), 0.0, offset);
        let speed = 2.0 * offset / self.max_duration_secs.max(self.dt());
        Ok(Walker::new(self.physics_seed(), start, 180.0, speed))
    }

    fn harness(
        &self,
        catalog: ZoneCatalog,
        config: EngineConfig,
        walker: Walker,
        options: SourceOptions,
        record: bool,
    ) -> Result<Harness, String> {
        Harness::new(self.seed, self.dt(), catalog, config, walker, options, record)
    }

    fn setup_walk_through(&self, record: bool) -> Result<Harness, String> {
        let walker = self.crossing_walker()?;
        self.harness(self.catalog.clone(), EngineConfig::default(), walker, SourceOptions::default(), record)
    }

    fn setup_departure(&self, record: bool) -> Result<Harness, String> {
        let zone = self.first_zone()?;
        let start = zone.center();

        // Head directly away from the centroid of the other zones
        let others: Vec<Coordinate> = self.catalog.iter().skip(1).map(|z| z.center()).collect();
        let bearing = if others.is_empty() {
            0.0
        } else {
            let n = others.len() as f64;
            let centroid = Coordinate::new(
                others.iter().map(|c| c.latitude).sum::<f64>() / n,
                others.iter().map(|c| c.longitude).sum::<f64>() / n,
            );
            (initial_bearing_deg(&centroid, &start) + 360.0) % 360.0
        };
        let speed = 2.0 * zone.radius_meters() / self.max_duration_secs.max(self.dt());

        let mut walker = Walker::new(self.physics_seed(), start, bearing, speed);
        walker.set_position_noise(0.0);
        self.harness(self.catalog.clone(), EngineConfig::default(), walker, SourceOptions::default(), record)
    }

    fn setup_glitch_storm(&self, record: bool) -> Result<Harness, String> {
        let walker = self.crossing_walker()?;
        self.harness(self.catalog.clone(), EngineConfig::default(), walker, SourceOptions::default(), record)
    }

    fn setup_sensor_dropout(&self, record: bool) -> Result<Harness, String> {
        let options = SourceOptions {
            high_accuracy: false,
            ..SourceOptions::default()
        };
        let mut walker = self.crossing_walker()?;
        walker.apply_options(&options);
        self.harness(self.catalog.clone(), EngineConfig::default(), walker, options, record)
    }

    fn setup_long_haul(&self, record: bool) -> Result<Harness, String> {
        let capacity = (self.total_ticks() / 4).max(1) as usize;
        let config = EngineConfig {
            trail_capacity: Some(capacity),
        };
        let walker = self.crossing_walker()?;
        self.harness(self.catalog.clone(), config, walker, SourceOptions::default(), record)
    }

    fn setup_empty_catalog(&self, record: bool) -> Result<Harness, String> {
        let start = self
            .catalog
            .get(0)
            .map(|z| z.center())
            .unwrap_or(Coordinate::new(0.0, 0.0));
        let walker = Walker::new(self.physics_seed(), start, 90.0, 1.4);
        self.harness(ZoneCatalog::empty(), EngineConfig::default(), walker, SourceOptions::default(), record)
    }
}

/// One running scenario: virtual clock, source, session, walker.
struct Harness {
    ctx: SimContext,
    source: ManualSource,
    session: TrackingSession,
    events: UnboundedReceiver<SessionEvent>,
    walker: Walker,
    dt: f64,
    tick: u64,
    metrics: ScenarioMetrics,
    export: Option<SimExport>,
    detached_seen: bool,
}

impl Harness {
    fn new(
        seed: u64,
        dt: f64,
        catalog: ZoneCatalog,
        config: EngineConfig,
        walker: Walker,
        options: SourceOptions,
        record: bool,
    ) -> Result<Self, String> {
        let export = record.then(|| SimExport::new("", seed, &catalog));
        let engine = TrackingEngine::with_config(catalog, config).map_err(|e| e.to_string())?;
        let (session, events) = TrackingSession::new(engine);
        let source = ManualSource::new();
        session.attach(&source, options).map_err(|e| e.to_string())?;

        Ok(Self {
            ctx: SimContext::new(seed),
            source,
            session,
            events,
            walker,
            dt,
            tick: 0,
            metrics: ScenarioMetrics::default(),
            export,
            detached_seen: false,
        })
    }

    /// Moves the walker and the clock one tick. Returns the new timestamp.
    fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.walker.step(self.dt);
        self.ctx.advance_time(Duration::from_secs_f64(self.dt));
        self.ctx.unix_millis()
    }

    /// The walker's noisy reading at the current time.
    fn reading(&mut self) -> PositionFix {
        let now = self.ctx.unix_millis();
        self.walker.reading(now)
    }

    fn emit(&mut self, fix: PositionFix) -> usize {
        self.metrics.fixes_emitted += 1;
        self.source.emit(fix)
    }

    fn fail(&mut self, error: SourceError) -> usize {
        self.source.fail(error)
    }

    /// Drains pending session events into the metrics.
    fn pump_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match &event {
                SessionEvent::ZoneEntered { .. } => self.metrics.zone_entries += 1,
                SessionEvent::ZoneExited { .. } => self.metrics.zone_exits += 1,
                SessionEvent::SourceFailed(_) => self.metrics.source_errors += 1,
                SessionEvent::Detached => self.detached_seen = true,
                SessionEvent::FixRejected { .. } => {}
            }
            out.push(event);
        }
        out
    }

    /// Records the end-of-tick state.
    fn end_tick(&mut self) {
        self.pump_events();
        let summary = self.session.summary();
        if let Some(distance) = summary.nearest_boundary_distance_meters {
            self.metrics.max_nearest_distance_m = self.metrics.max_nearest_distance_m.max(distance);
        }
        if let Some(export) = self.export.as_mut() {
            export.add_frame(SimFrame::new(self.walker.time(), self.walker.truth(), &summary));
        }
        if self.tick % 10 == 0 {
            debug!(
                "  t={:.1}s | inside={} | distance={:?} | trail={}",
                self.walker.time(),
                summary.inside_any_zone,
                summary.distance_label(),
                summary.trail_len
            );
        }
    }

    /// Independent containment check of the fix against the catalog.
    fn check_against_catalog(&self, fix: &PositionFix) -> Result<(), String> {
        let point = Coordinate::from(fix);
        self.session.with_engine(|engine| {
            let view = engine.current_state();
            let expected_inside = engine
                .catalog()
                .iter()
                .any(|z| haversine_distance_m(&z.center(), &point) <= z.radius_meters() + 1e-6);
            if view.inside_any_zone() != expected_inside {
                return Err(format!(
                    "tick {}: inside_any_zone={} but catalog says {}",
                    self.tick,
                    view.inside_any_zone(),
                    expected_inside
                ));
            }
            let expected_gap = engine
                .catalog()
                .iter()
                .map(|z| (haversine_distance_m(&z.center(), &point) - z.radius_meters()).max(0.0))
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))));
            match (view.nearest_boundary_distance_meters(), expected_gap) {
                (None, None) => Ok(()),
                (Some(got), Some(want)) if (got - want).abs() <= 1e-6 => Ok(()),
                (got, want) => Err(format!(
                    "tick {}: nearest distance {:?}, expected {:?}",
                    self.tick, got, want
                )),
            }
        })
    }

    fn finish(mut self, outcome: &Result<(), String>) -> (ScenarioMetrics, u64, f64, Option<SimExport>) {
        self.pump_events();
        let summary = self.session.summary();
        self.metrics.fixes_accepted = summary.accepted_count;
        self.metrics.fixes_rejected = summary.rejected_count;
        self.metrics.final_trail_len = summary.trail_len;

        let export = self.export.take().map(|mut export| {
            let trail = self.session.snapshot().trail;
            export.finalize(outcome.is_ok(), outcome.clone().err(), &trail);
            export
        });
        self.session.teardown();
        (self.metrics.clone(), self.tick, self.walker.time(), export)
    }
}

/// DST-001: WalkThrough - cross the first zone with GNSS noise.
fn run_walk_through(h: &mut Harness, ticks: u64) -> Result<(), String> {
    for _ in 0..ticks {
        h.advance();
        let fix = h.reading();
        if h.emit(fix) != 1 {
            return Err(format!("tick {}: fix not delivered", h.tick));
        }
        h.check_against_catalog(&fix)?;
        h.end_tick();
    }

    if h.metrics.zone_entries == 0 {
        return Err("never entered a zone".to_string());
    }
    if h.metrics.zone_exits == 0 {
        return Err("never left the zone".to_string());
    }
    if h.session.summary().inside_any_zone {
        return Err("still inside a zone at the end of the walk".to_string());
    }
    Ok(())
}

/// DST-002: Departure - nearest distance never shrinks while moving away
/// from every zone centre.
fn run_departure(h: &mut Harness, ticks: u64) -> Result<(), String> {
    let centers: Vec<Coordinate> = h.session.with_engine(|e| e.catalog().iter().map(|z| z.center()).collect());
    let distances = |p: &Coordinate| -> Vec<f64> { centers.iter().map(|c| haversine_distance_m(c, p)).collect() };

    let mut previous: Option<(Vec<f64>, f64)> = None;
    let mut qualifying = 0u64;

    for _ in 0..ticks {
        h.advance();
        let fix = h.reading();
        h.emit(fix);
        let point = Coordinate::from(fix);
        let now = distances(&point);
        let nearest = h
            .session
            .summary()
            .nearest_boundary_distance_meters
            .ok_or_else(|| format!("tick {}: no nearest distance", h.tick))?;

        if let Some((before, before_nearest)) = &previous {
            let receding = before.iter().zip(&now).all(|(b, n)| n > b);
            if receding {
                qualifying += 1;
                if nearest + 1e-9 < *before_nearest {
                    return Err(format!(
                        "tick {}: nearest distance shrank from {:.3} to {:.3}",
                        h.tick, before_nearest, nearest
                    ));
                }
            }
        }
        previous = Some((now, nearest));
        h.end_tick();
    }

    if qualifying == 0 {
        return Err("walker never moved away from every zone".to_string());
    }
    Ok(())
}

/// DST-003: GlitchStorm - corrupt fixes never reach the trail or flip the alert.
fn run_glitch_storm(h: &mut Harness, ticks: u64, chaos_seed: u64) -> Result<(), String> {
    let mut chaos = ChaCha8Rng::seed_from_u64(chaos_seed);
    let mut accepted: Vec<PositionFix> = Vec::new();
    let mut corrupted = 0u64;

    for _ in 0..ticks {
        h.advance();
        let good = h.reading();

        let glitch = if chaos.gen_bool(0.25) {
            match chaos.gen_range(0..4) {
                0 => Some(PositionFix::new(good.latitude + 200.0, good.longitude, good.timestamp_ms)),
                1 => Some(PositionFix::new(good.latitude, 500.0, good.timestamp_ms)),
                2 => Some(PositionFix::new(f64::NAN, good.longitude, good.timestamp_ms)),
                _ => accepted
                    .last()
                    .map(|last| PositionFix::new(good.latitude, good.longitude, last.timestamp_ms.saturating_sub(1_000)))
                    .filter(|fix| accepted.last().is_some_and(|last| fix.timestamp_ms < last.timestamp_ms)),
            }
        } else {
            None
        };

        match glitch {
            Some(bad) => {
                let before = h.session.summary();
                h.emit(bad);
                corrupted += 1;
                let after = h.session.summary();
                if after.inside_any_zone != before.inside_any_zone
                    || after.trail_len != before.trail_len
                    || after.last_fix != before.last_fix
                {
                    return Err(format!("tick {}: corrupt fix {} changed state", h.tick, bad));
                }
            }
            None => {
                h.emit(good);
                accepted.push(good);
                h.check_against_catalog(&good)?;
            }
        }
        h.end_tick();
    }

    let state = h.session.snapshot();
    if state.trail != accepted {
        return Err(format!(
            "trail holds {} fixes, expected the {} valid ones",
            state.trail.len(),
            accepted.len()
        ));
    }
    let rejected = h.session.summary().rejected_count;
    if rejected != corrupted {
        return Err(format!("{} fixes rejected, {} corrupted", rejected, corrupted));
    }
    Ok(())
}

/// DST-004: SensorDropout - failures and outages never touch track state.
fn run_sensor_dropout(h: &mut Harness, ticks: u64) -> Result<(), String> {
    let outage = (ticks / 3)..(ticks / 2);
    let mut failures = 0u64;

    for i in 0..ticks {
        h.advance();

        let failure = if i % 7 == 3 {
            Some(SourceError::Timeout(Duration::from_secs(5)))
        } else if i % 11 == 5 {
            Some(SourceError::unavailable("satellites lost"))
        } else {
            None
        };

        if let Some(error) = failure {
            let before = h.session.snapshot();
            h.fail(error.clone());
            failures += 1;
            if h.session.snapshot() != before {
                return Err(format!("tick {}: source failure changed state", h.tick));
            }
            if h.session.last_source_error() != Some(error) {
                return Err(format!("tick {}: failure not recorded", h.tick));
            }
        } else if !outage.contains(&i) {
            let fix = h.reading();
            h.emit(fix);
            h.check_against_catalog(&fix)?;
        }
        h.end_tick();
    }

    if h.metrics.source_errors != failures {
        return Err(format!(
            "{} failures injected, {} reported",
            failures, h.metrics.source_errors
        ));
    }
    if failures > 0 && h.session.last_source_error().is_none() {
        return Err("last source error missing".to_string());
    }
    Ok(())
}

/// DST-005: LongHaul - a bounded trail keeps exactly the newest fixes.
fn run_long_haul(h: &mut Harness, ticks: u64) -> Result<(), String> {
    let mut emitted: Vec<PositionFix> = Vec::new();
    for _ in 0..ticks {
        h.advance();
        let fix = h.reading();
        h.emit(fix);
        emitted.push(fix);
        h.end_tick();
    }

    let (capacity, evicted, accepted, trail) = h.session.with_engine(|e| {
        (
            e.config().trail_capacity.unwrap_or(usize::MAX),
            e.evicted_count(),
            e.accepted_count(),
            e.current_state().trail().copied().collect::<Vec<_>>(),
        )
    });

    let expected_len = emitted.len().min(capacity);
    if trail.len() != expected_len {
        return Err(format!("trail length {} (capacity {})", trail.len(), capacity));
    }
    if trail[..] != emitted[emitted.len() - expected_len..] {
        return Err("trail does not hold the newest fixes in order".to_string());
    }
    if evicted != accepted.saturating_sub(capacity as u64) {
        return Err(format!("{} evicted of {} accepted (capacity {})", evicted, accepted, capacity));
    }
    Ok(())
}

/// DST-006: EmptyCatalog - never inside, no nearest distance.
fn run_empty_catalog(h: &mut Harness, ticks: u64) -> Result<(), String> {
    for _ in 0..ticks {
        h.advance();
        let fix = h.reading();
        h.emit(fix);
        let summary = h.session.summary();
        if summary.inside_any_zone || summary.nearest_boundary_distance_meters.is_some() {
            return Err(format!("tick {}: zone state with no zones", h.tick));
        }
        if summary.active_severity.is_some() || summary.nearest_zone.is_some() {
            return Err(format!("tick {}: severity with no zones", h.tick));
        }
        h.end_tick();
    }

    let trail_len = h.session.summary().trail_len as u64;
    if trail_len != ticks {
        return Err(format!("trail length {} after {} fixes", trail_len, ticks));
    }
    Ok(())
}

/// DST-007: EarlyTeardown - nothing reaches the engine after teardown.
fn run_early_teardown(h: &mut Harness, ticks: u64) -> Result<(), String> {
    let cutoff = ticks / 2;
    let mut frozen = None;

    for i in 0..ticks {
        h.advance();
        if i == cutoff {
            if !h.session.teardown() {
                return Err("first teardown reported no work".to_string());
            }
            if h.session.teardown() {
                return Err("second teardown was not a no-op".to_string());
            }
            if h.source.subscriber_count() != 0 {
                return Err("subscription still live after teardown".to_string());
            }
            frozen = Some(h.session.snapshot());
        }

        let fix = h.reading();
        let delivered = h.emit(fix);
        if let Some(state) = &frozen {
            if delivered != 0 {
                return Err(format!("tick {}: fix delivered after teardown", h.tick));
            }
            if h.session.snapshot() != *state {
                return Err(format!("tick {}: state changed after teardown", h.tick));
            }
        }
        h.end_tick();
    }

    if !h.detached_seen {
        return Err("no Detached event".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_all_scenarios_pass_default_seed() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{} failed: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_walk_through_enters_and_exits() {
        let result = ScenarioRunner::new(7).run(ScenarioId::WalkThrough);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.zone_entries >= 1);
        assert!(result.metrics.zone_exits >= 1);
        assert_eq!(result.total_ticks, 50);
        assert_relative_eq!(result.final_time_secs, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_glitch_storm_counts() {
        let result = ScenarioRunner::new(3).with_duration(30.0).run(ScenarioId::GlitchStorm);
        assert!(result.passed, "{:?}", result.failure_reason);
        let m = &result.metrics;
        assert!(m.fixes_rejected > 0);
        assert_eq!(m.fixes_accepted + m.fixes_rejected, m.fixes_emitted);
        assert_eq!(m.final_trail_len as u64, m.fixes_accepted);
    }

    #[test]
    fn test_long_haul_evicts() {
        let result = ScenarioRunner::new(11).run(ScenarioId::LongHaul);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.final_trail_len, 12);
        assert_eq!(result.metrics.fixes_accepted, 50);
    }

    #[test]
    fn test_empty_catalog_fails_zone_scenarios() {
        let runner = ScenarioRunner::new(1).with_catalog(ZoneCatalog::empty());
        let result = runner.run(ScenarioId::WalkThrough);
        assert!(!result.passed);
        assert_eq!(result.total_ticks, 0);

        assert!(runner.run(ScenarioId::EmptyCatalog).passed);
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let a = ScenarioRunner::new(1234).run(ScenarioId::GlitchStorm);
        let b = ScenarioRunner::new(1234).run(ScenarioId::GlitchStorm);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn test_recorded_run_has_frame_per_tick() {
        let (result, export) = ScenarioRunner::new(5).run_recorded(ScenarioId::WalkThrough);
        assert_eq!(export.frames.len() as u64, result.total_ticks);
        assert_eq!(export.trail.len(), result.metrics.final_trail_len);
        assert_eq!(export.passed, result.passed);
        assert_eq!(export.zones.len(), 3);
    }

    #[test]
    fn test_early_teardown_stops_trail_halfway() {
        let result = ScenarioRunner::new(9).run(ScenarioId::EarlyTeardown);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.fixes_accepted, 25);
        assert_eq!(result.metrics.fixes_emitted, 50);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_fault_scenarios_hold_for_any_seed(seed in any::<u64>()) {
            let runner = ScenarioRunner::new(seed);
            for scenario in [ScenarioId::GlitchStorm, ScenarioId::SensorDropout, ScenarioId::LongHaul] {
                let result = runner.run(scenario);
                prop_assert!(result.passed, "{} seed={} failed: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }
}

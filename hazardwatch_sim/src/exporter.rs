//! JSON exporter for map visualization.
//!
//! Exports zone overlays and per-frame track state so an external viewer
//! can draw circles, the trail polyline and the alert banner.

use hazardwatch_core::{Coordinate, Severity, TrackSummary, ZoneCatalog};
use hazardwatch_env::PositionFix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A position on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinate> for MapPoint {
    fn from(c: Coordinate) -> Self {
        Self {
            lat: c.latitude,
            lng: c.longitude,
        }
    }
}

impl From<PositionFix> for MapPoint {
    fn from(f: PositionFix) -> Self {
        Self {
            lat: f.latitude,
            lng: f.longitude,
        }
    }
}

/// A zone circle to draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneOverlay {
    pub id: String,
    pub center: MapPoint,
    pub radius_meters: f64,
    pub severity: Severity,
    pub style_hint: String,
}

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Ground truth position
    pub truth: MapPoint,

    /// Last accepted fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<MapPoint>,

    pub inside_any_zone: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_boundary_distance_m: Option<f64>,

    pub trail_len: usize,
}

impl SimFrame {
    /// Builds a frame from the walker truth and the session summary.
    pub fn new(time_sec: f64, truth: Coordinate, summary: &TrackSummary) -> Self {
        Self {
            time_sec,
            truth: truth.into(),
            fix: summary.last_fix.map(MapPoint::from),
            inside_any_zone: summary.inside_any_zone,
            nearest_boundary_distance_m: summary.nearest_boundary_distance_meters,
            trail_len: summary.trail_len,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Zone overlays
    pub zones: Vec<ZoneOverlay>,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final trail (accepted fixes, arrival order)
    pub trail: Vec<MapPoint>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, catalog: &ZoneCatalog) -> Self {
        let zones = catalog
            .iter()
            .map(|z| ZoneOverlay {
                id: z.id().to_string(),
                center: z.center().into(),
                radius_meters: z.radius_meters(),
                severity: z.severity(),
                style_hint: z.severity().style_hint().to_string(),
            })
            .collect();
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            zones,
            frames: Vec::new(),
            trail: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>, trail: &[PositionFix]) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.trail = trail.iter().copied().map(MapPoint::from).collect();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_carries_style_hints() {
        let export = SimExport::new("walk_through", 42, &ZoneCatalog::builtin());
        let hints: Vec<&str> = export.zones.iter().map(|z| z.style_hint.as_str()).collect();
        assert_eq!(hints, vec!["orange", "yellow", "red"]);
    }

    #[test]
    fn test_frame_serializes_without_empty_fix() {
        let frame = SimFrame::new(0.0, Coordinate::new(1.0, 2.0), &TrackSummary::default());
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("fix").is_none());
        assert_eq!(json["truth"]["lat"], 1.0);
        assert_eq!(json["trail_len"], 0);
    }
}

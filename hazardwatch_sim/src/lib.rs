//! HazardWatch Deterministic Simulation Testing (DST) Harness
//!
//! Drives a real [`TrackingSession`](hazardwatch_core::TrackingSession)
//! with synthetic walks and injected faults, then checks the track state
//! against an independent evaluation of the zone catalog.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: Virtual clock advanced only by the harness
//! - **Position**: Ground-truth walker with seeded GNSS noise
//! - **Faults**: Corrupt fixes and source failures drawn from a separate seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                    │
//! │                                                      │
//! │  Walker ──reading──► ManualSource ──► TrackingSession│
//! │    ▲                     ▲                 │         │
//! │    │ step(dt)            │ fail(err)       ▼         │
//! │  SimContext          chaos rng        checks + export│
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hazardwatch_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::GlitchStorm);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod live;
mod runner;
pub mod scenarios;
mod walker;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{MapPoint, SimExport, SimFrame, ZoneOverlay};
pub use live::{crossing_path, run_live, LiveReport};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use walker::{Walker, HIGH_ACCURACY_NOISE_M, LOW_POWER_NOISE_M};

//! Paced replay through the channel-backed source.
//!
//! Unlike the scenario runner, which delivers fixes synchronously, this
//! path goes through [`ChannelSource`] and its background task, the same
//! way a production sensor bridge would feed a session.

use crate::error::SimError;
use crate::walker::Walker;

use hazardwatch_core::{
    destination_point, Coordinate, SessionEvent, TrackSummary, TrackingEngine, TrackingSession, ZoneCatalog,
};
use hazardwatch_env::{ChannelSource, HazardContext, PositionFix, SourceError, SourceOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long to wait for the source task to drain after the producer stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a live replay.
#[derive(Debug, Clone)]
pub struct LiveReport {
    pub fixes_sent: usize,
    pub zone_entries: u64,
    pub zone_exits: u64,
    pub fixes_rejected: u64,
    /// Source failures other than the final close
    pub source_errors: u64,
    pub summary: TrackSummary,
    pub trail: Vec<PositionFix>,
}

/// A straight north-to-south path across the first zone, `points` long.
///
/// Falls back to a short walk at the origin when the catalog is empty.
pub fn crossing_path(catalog: &ZoneCatalog, seed: u64, points: usize) -> Vec<Coordinate> {
    let (start, length) = match catalog.get(0) {
        Some(zone) => {
            let offset = zone.radius_meters() * 2.0;
            (destination_point(&zone.center(), 0.0, offset), offset * 2.0)
        }
        None => (Coordinate::new(0.0, 0.0), 100.0),
    };

    let step = length / points.max(1) as f64;
    let mut walker = Walker::new(seed, start, 180.0, step);
    (0..points)
        .map(|_| {
            walker.step(1.0);
            Coordinate::from(walker.reading(0))
        })
        .collect()
}

/// Replays `path` at `interval` through a [`ChannelSource`], stamping each
/// fix with the context's clock.
///
/// Must be called from within a Tokio runtime. Returns once the source has
/// reported that the producer closed, so every sent fix has been applied.
pub async fn run_live<C: HazardContext>(
    ctx: Arc<C>,
    catalog: ZoneCatalog,
    path: &[Coordinate],
    interval: Duration,
    options: SourceOptions,
) -> Result<LiveReport, SimError> {
    let (source, sender) = ChannelSource::new();
    let (session, mut events) = TrackingSession::new(TrackingEngine::new(catalog));
    session.attach(&source, options)?;
    info!(session = %session.id(), points = path.len(), ?interval, "live replay started");

    let mut fixes_sent = 0;
    for point in path {
        ctx.sleep(interval).await;
        sender.send_fix(PositionFix::new(point.latitude, point.longitude, ctx.unix_millis()))?;
        fixes_sent += 1;
    }
    drop(sender);

    let mut report = LiveReport {
        fixes_sent,
        zone_entries: 0,
        zone_exits: 0,
        fixes_rejected: 0,
        source_errors: 0,
        summary: TrackSummary::default(),
        trail: Vec::new(),
    };

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::ZoneEntered { fix, severity } => {
                    debug!(%fix, ?severity, "live: entered");
                    report.zone_entries += 1;
                }
                SessionEvent::ZoneExited { fix, .. } => {
                    debug!(%fix, "live: exited");
                    report.zone_exits += 1;
                }
                SessionEvent::FixRejected { .. } => report.fixes_rejected += 1,
                SessionEvent::SourceFailed(SourceError::Closed) => break,
                SessionEvent::SourceFailed(_) => report.source_errors += 1,
                SessionEvent::Detached => break,
            }
        }
    })
    .await;

    session.teardown();
    drained.map_err(|_| SimError::DrainTimeout(DRAIN_TIMEOUT))?;

    report.summary = session.summary();
    report.trail = session.snapshot().trail;
    info!(
        fixes = report.fixes_sent,
        entries = report.zone_entries,
        exits = report.zone_exits,
        inside = report.summary.inside_any_zone,
        "live replay finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use approx::assert_abs_diff_eq;
    use hazardwatch_core::haversine_distance_m;

    #[test]
    fn test_crossing_path_spans_first_zone() {
        let catalog = ZoneCatalog::builtin();
        let zone = catalog.get(0).unwrap();
        let path = crossing_path(&catalog, 1, 40);
        assert_eq!(path.len(), 40);

        let first = haversine_distance_m(&zone.center(), &path[0]);
        assert_abs_diff_eq!(first, zone.radius_meters() * 1.9, epsilon = 15.0);
        assert!(path.iter().any(|p| zone.contains(p)));
    }

    #[tokio::test]
    async fn test_live_replay_on_virtual_clock() {
        let ctx = SimContext::shared(42);
        let catalog = ZoneCatalog::builtin();
        let path = crossing_path(&catalog, 42, 40);

        let report = run_live(
            ctx.clone(),
            catalog,
            &path,
            Duration::from_millis(200),
            SourceOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.fixes_sent, 40);
        assert_eq!(report.trail.len(), 40);
        assert_eq!(report.fixes_rejected, 0);
        assert!(report.zone_entries >= 1);
        assert!(report.zone_exits >= 1);
        assert!(!report.summary.inside_any_zone);

        // Stamped by the virtual clock: 2024-01-01 plus 200ms per fix
        assert_eq!(report.trail[0].timestamp_ms, 1_704_067_200_200);
        assert_eq!(report.trail[39].timestamp_ms, 1_704_067_208_000);
    }

    #[tokio::test]
    async fn test_live_replay_empty_path() {
        let report = run_live(
            SimContext::shared(1),
            ZoneCatalog::empty(),
            &[],
            Duration::from_millis(10),
            SourceOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.fixes_sent, 0);
        assert!(report.trail.is_empty());
        assert_eq!(report.summary, TrackSummary::default());
    }
}

//! Execution context trait for HazardWatch drivers.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstracts time for everything that produces or paces position fixes.
///
/// # Implementations
///
/// - **Production**: [`TokioContext`](crate::TokioContext) - wraps `tokio::time` and the system clock
/// - **Simulation**: `SimContext` - a seeded virtual clock advanced by the harness
///
/// # Determinism
///
/// Fix timestamps are taken from [`unix_millis`](Self::unix_millis), so a
/// simulated run stamps every fix identically for the same seed.
#[async_trait]
pub trait HazardContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp fixes.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns the context's seed (0 when not seeded).
    fn seed(&self) -> u64;

    /// Wall-clock time as Unix milliseconds, saturating at zero before 1970.
    fn unix_millis(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

//! Ground truth walker for simulation.
//!
//! The Walker maintains the "God's eye view" of the tracked person:
//! - True position on the sphere
//! - Constant-speed motion along a great circle
//! - Noisy position fixes, the way a GNSS receiver would report them

use hazardwatch_core::{destination_point, initial_bearing_deg, Coordinate};
use hazardwatch_env::{PositionFix, SourceOptions};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Horizontal noise (1 sigma, metres) in high-accuracy mode.
pub const HIGH_ACCURACY_NOISE_M: f64 = 3.0;

/// Horizontal noise (1 sigma, metres) in low-power mode.
pub const LOW_POWER_NOISE_M: f64 = 12.0;

/// The Walker - moves the true position and generates noisy fixes.
pub struct Walker {
    /// RNG for sensor noise (separate from chaos decisions)
    physics_rng: ChaCha8Rng,

    /// True position
    truth: Coordinate,

    /// Heading, degrees clockwise from north
    bearing_deg: f64,

    /// Ground speed (m/s)
    speed_mps: f64,

    /// Position noise standard deviation (metres)
    noise_std_m: f64,

    /// Simulated seconds walked
    elapsed_secs: f64,
}

impl Walker {
    /// Creates a walker at `start`.
    ///
    /// The physics seed should be derived separately from any chaos seed so
    /// that injecting faults doesn't change the trajectory.
    pub fn new(physics_seed: u64, start: Coordinate, bearing_deg: f64, speed_mps: f64) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            truth: start,
            bearing_deg,
            speed_mps,
            noise_std_m: HIGH_ACCURACY_NOISE_M,
            elapsed_secs: 0.0,
        }
    }

    /// Sets the position noise standard deviation (0 = perfect fixes).
    pub fn set_position_noise(&mut self, std_dev_m: f64) {
        self.noise_std_m = std_dev_m.max(0.0);
    }

    /// Picks the noise level a real receiver would deliver for `options`.
    pub fn apply_options(&mut self, options: &SourceOptions) {
        self.noise_std_m = if options.high_accuracy {
            HIGH_ACCURACY_NOISE_M
        } else {
            LOW_POWER_NOISE_M
        };
    }

    /// Re-aims the walker at `target`.
    pub fn head_towards(&mut self, target: &Coordinate) {
        self.bearing_deg = initial_bearing_deg(&self.truth, target);
    }

    /// Advances the true position by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let distance = self.speed_mps * dt;
        if distance > 0.0 {
            let next = destination_point(&self.truth, self.bearing_deg, distance);
            // Keep following the same great circle
            self.bearing_deg = (initial_bearing_deg(&next, &self.truth) + 180.0) % 360.0;
            self.truth = next;
        }
        self.elapsed_secs += dt;
    }

    /// A fix of the current position with sensor noise applied.
    pub fn reading(&mut self, timestamp_ms: u64) -> PositionFix {
        let observed = match Normal::new(0.0, self.noise_std_m) {
            Ok(normal) if self.noise_std_m > 0.0 => {
                let north: f64 = normal.sample(&mut self.physics_rng);
                let east: f64 = normal.sample(&mut self.physics_rng);
                let offset = north.hypot(east);
                let bearing = east.atan2(north).to_degrees();
                destination_point(&self.truth, bearing, offset)
            }
            _ => self.truth,
        };
        PositionFix::new(observed.latitude, observed.longitude, timestamp_ms)
    }

    pub fn truth(&self) -> Coordinate {
        self.truth
    }

    pub fn bearing_deg(&self) -> f64 {
        self.bearing_deg
    }

    pub fn noise_std_m(&self) -> f64 {
        self.noise_std_m
    }

    /// Simulated seconds walked.
    pub fn time(&self) -> f64 {
        self.elapsed_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hazardwatch_core::haversine_distance_m;

    const START: Coordinate = Coordinate {
        latitude: 19.0493847,
        longitude: 72.8941718,
    };

    #[test]
    fn test_walks_expected_distance() {
        let mut walker = Walker::new(1, START, 180.0, 2.0);
        for _ in 0..50 {
            walker.step(1.0);
        }
        assert_abs_diff_eq!(haversine_distance_m(&START, &walker.truth()), 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(walker.time(), 50.0);
    }

    #[test]
    fn test_noise_free_reading_is_truth() {
        let mut walker = Walker::new(1, START, 90.0, 1.0);
        walker.set_position_noise(0.0);
        walker.step(3.0);

        let fix = walker.reading(1_000);
        assert_eq!(Coordinate::from(fix), walker.truth());
        assert_eq!(fix.timestamp_ms, 1_000);
    }

    #[test]
    fn test_same_seed_same_readings() {
        let mut a = Walker::new(99, START, 45.0, 1.5);
        let mut b = Walker::new(99, START, 45.0, 1.5);
        for t in 0..20 {
            a.step(0.2);
            b.step(0.2);
            assert_eq!(a.reading(t), b.reading(t));
        }
    }

    #[test]
    fn test_noise_stays_plausible() {
        let mut walker = Walker::new(7, START, 0.0, 0.0);
        for t in 0..200 {
            let fix = walker.reading(t);
            // 10 sigma would be astronomically unlikely
            assert!(haversine_distance_m(&START, &Coordinate::from(fix)) < 10.0 * HIGH_ACCURACY_NOISE_M);
        }
    }

    #[test]
    fn test_options_select_noise() {
        let mut walker = Walker::new(1, START, 0.0, 0.0);
        walker.apply_options(&SourceOptions {
            high_accuracy: false,
            ..Default::default()
        });
        assert_eq!(walker.noise_std_m(), LOW_POWER_NOISE_M);
        walker.apply_options(&SourceOptions::default());
        assert_eq!(walker.noise_std_m(), HIGH_ACCURACY_NOISE_M);
    }

    #[test]
    fn test_head_towards() {
        let target = destination_point(&START, 270.0, 500.0);
        let mut walker = Walker::new(1, START, 0.0, 10.0);
        walker.head_towards(&target);
        walker.step(10.0);
        assert_abs_diff_eq!(haversine_distance_m(&walker.truth(), &target), 400.0, epsilon = 1e-3);
    }
}

//! Rate Estimator (spec.md §4.1 "Rate estimation", §2 RE): tracks how fast
//! a device is actually consuming/producing frames against its nominal
//! sample rate, so the mixer can stretch or compress to compensate for
//! clock drift between the audio clock and the wall clock.
//!
//! A small self-contained running estimate: a plain, directly-testable
//! numeric struct rather than a statistics crate dependency.

use std::time::{Duration, Instant};

/// Minimum window before a new estimate is computed; shorter windows are
/// dominated by scheduling jitter rather than real drift.
const MIN_WINDOW: Duration = Duration::from_millis(500);

/// Tracks actual vs nominal sample rate for one device.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    nominal_rate: f64,
    estimated_rate: f64,
    window_start: Instant,
    frames_since_window_start: u64,
}

impl RateEstimator {
    /// Starts a fresh estimator for a device nominally running at
    /// `nominal_rate` Hz. `estimated_rate` begins equal to `nominal_rate`
    /// so `get_est_rate_ratio` is exactly 1.0 until enough data arrives.
    pub fn new(nominal_rate: u32) -> Self {
        Self {
            nominal_rate: nominal_rate as f64,
            estimated_rate: nominal_rate as f64,
            window_start: Instant::now(),
            frames_since_window_start: 0,
        }
    }

    /// Called on each hardware buffer-level observation with the number
    /// of frames consumed/produced since the last call.
    pub fn update(&mut self, frames: u32) {
        self.frames_since_window_start += frames as u64;
        let elapsed = self.window_start.elapsed();
        if elapsed >= MIN_WINDOW {
            self.estimated_rate = self.frames_since_window_start as f64 / elapsed.as_secs_f64();
            self.window_start = Instant::now();
            self.frames_since_window_start = 0;
        }
    }

    /// `estimated / nominal`, consumed by the mixer to stretch/compress.
    pub fn get_est_rate_ratio(&self) -> f64 {
        self.estimated_rate / self.nominal_rate
    }

    /// Reset on device open or format change (spec.md §4.1).
    pub fn reset(&mut self, nominal_rate: u32) {
        *self = Self::new(nominal_rate);
    }
}

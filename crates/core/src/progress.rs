//! Time-based progress estimation for a running job.
//!
//! The backend reports no progress, so the estimate is derived purely from
//! elapsed time against a fixed expected duration. The estimate is capped
//! below completion; only an observed `completed` status reports 100%.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default expected generation time (7 minutes).
pub const DEFAULT_EXPECTED_DURATION: Duration = Duration::from_secs(7 * 60);

/// Highest fraction the time-based estimate may report.
pub const MAX_ESTIMATED_FRACTION: f64 = 0.95;

// ---------------------------------------------------------------------------
// ProgressEstimate
// ---------------------------------------------------------------------------

/// Snapshot of estimated progress at a given moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    /// Completion fraction in `0.0..=1.0`.
    pub fraction: f64,
    /// Time since submission.
    pub elapsed: Duration,
    /// Estimated time left. Zero once the expected duration has passed.
    pub remaining: Duration,
}

impl ProgressEstimate {
    /// Estimate for a job still processing after `elapsed`.
    pub fn running(elapsed: Duration, expected: Duration) -> Self {
        Self {
            fraction: estimate_fraction(elapsed, expected),
            elapsed,
            remaining: expected.saturating_sub(elapsed),
        }
    }

    /// Estimate for a job the backend reported as completed.
    pub fn finished(elapsed: Duration) -> Self {
        Self {
            fraction: 1.0,
            elapsed,
            remaining: Duration::ZERO,
        }
    }

    /// Whole percent, rounded down.
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// `min(0.95, elapsed / expected)`.
///
/// A zero `expected` duration reports the cap immediately.
pub fn estimate_fraction(elapsed: Duration, expected: Duration) -> f64 {
    if expected.is_zero() {
        return MAX_ESTIMATED_FRACTION;
    }
    (elapsed.as_secs_f64() / expected.as_secs_f64()).min(MAX_ESTIMATED_FRACTION)
}

/// Convert a signed chrono duration to `std`, clamping negatives to zero.
///
/// Clock skew between a persisted `submitted_at` and the local clock can
/// produce a negative elapsed time.
pub fn elapsed_since(delta: chrono::Duration) -> Duration {
    delta.to_std().unwrap_or(Duration::ZERO)
}

//! Heuristic progress estimation for the client poll loop.
//!
//! The render provider reports no usable completion percentage while a job
//! runs, so the poller shows an estimate derived from elapsed time against
//! a typical render duration. The estimate is monotonically increasing and
//! capped below 100 until a terminal status is observed.

/// Estimated percentage never exceeds this value while the job is running.
pub const PROGRESS_CAP_PERCENT: u8 = 95;

/// Typical end-to-end render duration used when the caller has no better
/// estimate, in seconds.
pub const DEFAULT_EXPECTED_DURATION_SECS: f64 = 90.0;

/// Estimate render progress from elapsed wall-clock time.
///
/// Linear ramp over `expected_secs`, capped at [`PROGRESS_CAP_PERCENT`].
/// A non-positive `expected_secs` falls back to
/// [`DEFAULT_EXPECTED_DURATION_SECS`].
pub fn estimate_percent(elapsed_secs: f64, expected_secs: f64) -> u8 {
    let expected = if expected_secs > 0.0 {
        expected_secs
    } else {
        DEFAULT_EXPECTED_DURATION_SECS
    };

    let raw = (elapsed_secs.max(0.0) / expected) * 100.0;
    (raw as u8).min(PROGRESS_CAP_PERCENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(estimate_percent(0.0, 90.0), 0);
    }

    #[test]
    fn is_monotonic_in_elapsed_time() {
        let mut last = 0;
        for tick in 0..200 {
            let pct = estimate_percent(tick as f64, 90.0);
            assert!(pct >= last, "progress regressed at tick {tick}");
            last = pct;
        }
    }

    #[test]
    fn never_reaches_one_hundred() {
        assert_eq!(estimate_percent(1e6, 90.0), PROGRESS_CAP_PERCENT);
    }

    #[test]
    fn halfway_through_expected_duration_is_half() {
        assert_eq!(estimate_percent(45.0, 90.0), 50);
    }

    #[test]
    fn negative_elapsed_clamps_to_zero() {
        assert_eq!(estimate_percent(-5.0, 90.0), 0);
    }

    #[test]
    fn non_positive_expected_uses_default() {
        assert_eq!(
            estimate_percent(45.0, 0.0),
            estimate_percent(45.0, DEFAULT_EXPECTED_DURATION_SECS)
        );
    }
}

//! Cleaning metrics
//!
//! Counters and timings emitted through the `metrics` facade. Nothing is
//! exported unless a recorder is installed by the embedding process.

use std::time::Instant;

pub const ROWS_READ: &str = "basic_cleaning_rows_read_total";
pub const ROWS_KEPT: &str = "basic_cleaning_rows_kept_total";
pub const ROWS_DROPPED: &str = "basic_cleaning_rows_dropped_total";
pub const DATES_COERCED: &str = "basic_cleaning_dates_coerced_total";
pub const ARTIFACTS_PUBLISHED: &str = "basic_cleaning_artifacts_published_total";
pub const STEP_DURATION: &str = "basic_cleaning_step_duration_seconds";

pub fn metric_names() -> Vec<&'static str> {
    vec![
        ROWS_READ,
        ROWS_KEPT,
        ROWS_DROPPED,
        DATES_COERCED,
        ARTIFACTS_PUBLISHED,
        STEP_DURATION,
    ]
}

pub struct CleaningMetrics;

impl CleaningMetrics {
    pub fn record_filter(rows_read: usize, rows_kept: usize) {
        ::metrics::counter!(ROWS_READ).increment(rows_read as u64);
        ::metrics::counter!(ROWS_KEPT).increment(rows_kept as u64);
        ::metrics::counter!(ROWS_DROPPED).increment(rows_read.saturating_sub(rows_kept) as u64);
    }

    pub fn record_dates_coerced(count: usize) {
        ::metrics::counter!(DATES_COERCED).increment(count as u64);
    }

    pub fn record_published() {
        ::metrics::counter!(ARTIFACTS_PUBLISHED).increment(1);
    }
}

/// Records the elapsed time of one pipeline step when dropped.
pub struct TimingGuard {
    start: Instant,
    step: &'static str,
}

impl TimingGuard {
    pub fn new(step: &'static str) -> Self {
        Self {
            start: Instant::now(),
            step,
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        ::metrics::histogram!(STEP_DURATION, "step" => self.step).record(duration);
    }
}

pub fn time_step(step: &'static str) -> TimingGuard {
    TimingGuard::new(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_a_no_op() {
        CleaningMetrics::record_filter(10, 4);
        CleaningMetrics::record_dates_coerced(1);
        CleaningMetrics::record_published();
        let _timing = time_step("load");
    }

    #[test]
    fn test_metric_names_share_prefix() {
        for name in metric_names() {
            assert!(name.starts_with("basic_cleaning_"));
        }
    }
}

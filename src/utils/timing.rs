//! Timing helpers for request handling
//!
//! Media responses report how long a resolution took, whether it came from
//! the cache, joined another caller's fetch, or fetched fresh.

use log::{debug, warn};
use std::time::{Duration, Instant};

/// A timer for measuring operation durations
#[derive(Debug)]
pub struct Timer {
    start_time: Instant,
    operation_name: String,
}

impl Timer {
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting timer for: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Finish the timer and log the total duration
    pub fn finish(self) -> Duration {
        let total_duration = self.start_time.elapsed();
        debug!(
            "{} completed in {}ms",
            self.operation_name,
            total_duration.as_millis()
        );
        total_duration
    }

    /// Finish with a warning if the operation took too long
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let name = self.operation_name.clone();
        let total_duration = self.finish();
        if total_duration > threshold {
            warn!(
                "{} took {}ms (exceeds threshold of {}ms)",
                name,
                total_duration.as_millis(),
                threshold.as_millis()
            );
        }
        total_duration
    }
}

/// Formats a duration the way the media envelopes report it, e.g. `0.42s`
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

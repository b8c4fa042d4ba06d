//! Per-event emission metrics

use serde::Serialize;
use std::time::Duration;

/// Accumulated timings for one event name
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EventMetrics {
    /// Number of emissions
    pub count: u64,
    /// Subscriber failures across all emissions
    pub errors: u64,
    pub total: Duration,
    pub max: Duration,
}

impl EventMetrics {
    pub fn record(&mut self, elapsed: Duration, errors: u64) {
        self.count += 1;
        self.errors += errors;
        self.total += elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
    }

    /// Mean emission time
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total / self.count as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut metrics = EventMetrics::default();
        metrics.record(Duration::from_millis(10), 0);
        metrics.record(Duration::from_millis(30), 2);
        assert_eq!(metrics.count, 2);
        assert_eq!(metrics.errors, 2);
        assert_eq!(metrics.max, Duration::from_millis(30));
        assert_eq!(metrics.average(), Duration::from_millis(20));
    }

    #[test]
    fn test_empty_average() {
        assert_eq!(EventMetrics::default().average(), Duration::ZERO);
    }
}

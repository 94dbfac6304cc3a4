//! Running attempt statistics

use super::events::AttemptResult;

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub pending: u64,
}

impl RunningStats {
    /// Percentage of successful attempts; 100 before anything was attempted
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

/// Owns the counters. Only the event consumer holds one.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: RunningStats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &AttemptResult) {
        self.stats.total += 1;
        if result.succeeded() {
            self.stats.succeeded += 1;
        } else {
            self.stats.failed += 1;
        }
    }

    /// Raise or lower the pending count, never below zero
    pub fn adjust_pending(&mut self, delta: i64) {
        self.stats.pending = if delta >= 0 {
            self.stats.pending.saturating_add(delta as u64)
        } else {
            self.stats.pending.saturating_sub(delta.unsigned_abs())
        };
    }

    pub fn snapshot(&self) -> RunningStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::events::{AttemptOutcome, AttemptTarget, OperationKind};

    fn result(ok: bool) -> AttemptResult {
        AttemptResult {
            kind: OperationKind::Delegate,
            ordinal: 1,
            total: 4,
            outcome: if ok {
                AttemptOutcome::Success {
                    hash: "H".to_string(),
                }
            } else {
                AttemptOutcome::Failure {
                    error: "rejected".to_string(),
                }
            },
            target: AttemptTarget::Validator("empevaloper1a".to_string()),
        }
    }

    #[test]
    fn test_empty_rate_is_hundred() {
        let stats = StatsAggregator::new().snapshot();
        assert_eq!(stats, RunningStats::default());
        assert_eq!(stats.success_rate(), 100.0);
    }

    #[test]
    fn test_counters_and_rate() {
        let mut agg = StatsAggregator::new();
        agg.adjust_pending(4);
        for ok in [true, true, false, true] {
            agg.record(&result(ok));
            agg.adjust_pending(-1);
        }

        let stats = agg.snapshot();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut agg = StatsAggregator::new();
        agg.record(&result(false));
        agg.adjust_pending(2);
        assert_eq!(agg.snapshot(), agg.snapshot());
    }

    #[test]
    fn test_pending_saturates() {
        let mut agg = StatsAggregator::new();
        agg.adjust_pending(1);
        agg.adjust_pending(-5);
        assert_eq!(agg.snapshot().pending, 0);
        agg.adjust_pending(i64::MIN);
        assert_eq!(agg.snapshot().pending, 0);
    }
}

//! Worker-wide counters, snapshotted to disk on every change.

use crate::matcher::MatchConfidence;
use serde::{Deserialize, Serialize};

/// `{HIGH, LOW, FAIL}` counts for the matcher. Tracked separately from
/// success/failure counts because a `HIGH` match can still fail to write
/// (e.g. a subsequent Plex error).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfidenceHistogram {
    pub high: u64,
    pub low: u64,
    pub fail: u64,
}

impl MatchConfidenceHistogram {
    pub fn record(&mut self, outcome: Option<MatchConfidence>) {
        match outcome {
            Some(MatchConfidence::High) => self.high += 1,
            Some(MatchConfidence::Low) => self.low += 1,
            None => self.fail += 1,
        }
    }
}

/// Cumulative worker counters. A [`Stats`] value is always written as a
/// whole-snapshot replace, never summed with the value already on disk —
/// summing would double count on every `load`-then-`save` cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub success_count: u64,
    pub failure_count: u64,
    pub dlq_count: u64,
    pub total_processing_time_sec: u64,
    pub match_confidence_histogram: MatchConfidenceHistogram,
}

impl Stats {
    pub fn record_success(&mut self, processing_time_sec: u64, confidence: MatchConfidence) {
        self.success_count += 1;
        self.total_processing_time_sec += processing_time_sec;
        self.match_confidence_histogram.record(Some(confidence));
    }

    pub fn record_failure(&mut self, processing_time_sec: u64) {
        self.failure_count += 1;
        self.total_processing_time_sec += processing_time_sec;
        self.match_confidence_histogram.record(None);
    }

    pub fn record_dlq(&mut self) {
        self.dlq_count += 1;
    }

    /// A job that was neither a clean success nor a failure — e.g. an
    /// ambiguous match skipped under non-strict matching. Counted in the
    /// confidence histogram only; success/failure counters are untouched.
    pub fn record_skipped(&mut self, confidence: MatchConfidence) {
        self.match_confidence_histogram.record(Some(confidence));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_success_updates_histogram_and_time() {
        let mut stats = Stats::default();
        stats.record_success(5, MatchConfidence::High);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.total_processing_time_sec, 5);
        assert_eq!(stats.match_confidence_histogram.high, 1);
    }

    #[test]
    fn record_failure_counts_as_fail_in_histogram() {
        let mut stats = Stats::default();
        stats.record_failure(2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.match_confidence_histogram.fail, 1);
    }

    #[test]
    fn dlq_count_is_independent_of_failure_count() {
        let mut stats = Stats::default();
        stats.record_failure(1);
        stats.record_dlq();
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.dlq_count, 1);
    }
}

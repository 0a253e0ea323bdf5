// SPDX-License-Identifier: MIT

//! Outage history record.

use crate::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    pub started_at: u64,
    pub ended_at: Option<u64>,
    pub first_error_kind: ErrorKind,
    pub duration_sec: Option<u64>,
}

impl OutageRecord {
    pub fn open(started_at: u64, first_error_kind: ErrorKind) -> Self {
        Self {
            started_at,
            ended_at: None,
            first_error_kind,
            duration_sec: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Close the outage, computing `duration_sec = ended_at - started_at`.
    pub fn close(&mut self, ended_at: u64) {
        self.ended_at = Some(ended_at);
        self.duration_sec = Some(ended_at.saturating_sub(self.started_at));
    }
}

/// Mean time to recovery: mean `duration_sec` over completed outages.
/// Records lacking `ended_at` are excluded.
pub fn mttr(records: &[OutageRecord]) -> Option<f64> {
    let durations: Vec<f64> = records
        .iter()
        .filter_map(|r| r.duration_sec.map(|d| d as f64))
        .collect();
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<f64>() / durations.len() as f64)
}

/// Mean time between failures: mean inter-failure *uptime*
/// (`completed[i].started_at - completed[i-1].ended_at`), not inter-start
/// interval. Records lacking `ended_at` are
/// excluded before computing gaps, matching the spec's exclusion rule.
pub fn mtbf(records: &[OutageRecord]) -> Option<f64> {
    let completed: Vec<&OutageRecord> = records.iter().filter(|r| r.ended_at.is_some()).collect();
    if completed.len() < 2 {
        return None;
    }
    let gaps: Vec<f64> = completed
        .windows(2)
        .map(|w| {
            let prev_ended = w[0].ended_at.unwrap_or(w[0].started_at);
            w[1].started_at.saturating_sub(prev_ended) as f64
        })
        .collect();
    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_computes_duration() {
        let mut record = OutageRecord::open(1000, ErrorKind::ServerDown);
        record.close(1065);
        assert_eq!(record.duration_sec, Some(65));
        assert_eq!(record.ended_at, Some(1065));
    }

    #[test]
    fn mttr_excludes_open_records() {
        let mut closed = OutageRecord::open(0, ErrorKind::ServerDown);
        closed.close(100);
        let open = OutageRecord::open(200, ErrorKind::ServerDown);
        assert_eq!(mttr(&[closed, open]), Some(100.0));
    }

    #[test]
    fn mtbf_measures_inter_failure_uptime_not_inter_start() {
        // Outage 1: 0..100. Outage 2 starts at 500, runs to 600.
        // Uptime between them is 500 - 100 = 400, not 500 - 0 = 500.
        let mut first = OutageRecord::open(0, ErrorKind::ServerDown);
        first.close(100);
        let mut second = OutageRecord::open(500, ErrorKind::ServerDown);
        second.close(600);
        assert_eq!(mtbf(&[first, second]), Some(400.0));
    }

    #[test]
    fn mtbf_needs_at_least_two_completed_records() {
        let mut closed = OutageRecord::open(0, ErrorKind::ServerDown);
        closed.close(100);
        assert_eq!(mtbf(&[closed]), None);
    }
}
